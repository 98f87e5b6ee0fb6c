use rocket::{serde::json::Json, Route, State};

use crate::{
    backend::{RegistryLookup, SharedBackend},
    error::{Error, Result},
    model::{
        catalog::Party,
        pagination::{Paginated, Pagination},
    },
};

pub fn routes() -> Vec<Route> {
    routes![parties]
}

/// Browse the national party ballot a page at a time.
#[get("/parties")]
pub async fn parties(
    pagination: std::result::Result<Pagination, Error>,
    backend: &State<SharedBackend>,
) -> Result<Json<Paginated<Party>>> {
    let pagination = pagination?;
    let catalog = RegistryLookup::new(&**backend.inner()).parties().await?;
    Ok(Json(catalog.page(&pagination)))
}
