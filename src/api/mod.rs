use rocket::{data::Capped, Data, Route};

use crate::{
    config::Config,
    error::{Error, Result},
};

pub mod identity;
pub mod party;
pub mod session;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(identity::routes());
    routes.extend(session::routes());
    routes.extend(party::routes());
    routes
}

/// Read an uploaded id card image, refusing anything over the configured limit.
async fn read_image(image: Data<'_>, config: &Config) -> Result<Vec<u8>> {
    let bytes: Capped<Vec<u8>> = image
        .open(config.image_limit())
        .into_bytes()
        .await
        .map_err(|e| Error::BadRequest(format!("Could not read image: {e}")))?;
    if !bytes.is_complete() {
        return Err(Error::BadRequest(format!(
            "Image exceeds {} limit",
            config.image_limit()
        )));
    }
    Ok(bytes.into_inner())
}
