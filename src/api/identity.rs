use rocket::{http::CookieJar, serde::json::Json, Data, Route, State};

use crate::{
    backend::SharedBackend,
    config::Config,
    error::Result,
    identity::{
        extract::NationalIdExtractor,
        ocr::{ProgressReporter, SharedOcr},
        ExistenceVerdict, IdentityOutcome, IdentityPipeline,
    },
    model::voter::IdentityContext,
};

use super::read_image;

pub fn routes() -> Vec<Route> {
    routes![verify, forget]
}

/// Check an id card image against the registry. A registered voter's id
/// becomes the identity context for later voting sessions; any other result
/// leaves the client without one.
#[post("/identity/verify", data = "<image>")]
pub async fn verify(
    image: Data<'_>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    ocr: &State<SharedOcr>,
    backend: &State<SharedBackend>,
    extractor: &State<NationalIdExtractor>,
) -> Result<Json<IdentityOutcome>> {
    IdentityContext::clear(cookies);
    let image = read_image(image, config).await?;

    let pipeline = IdentityPipeline::new(
        &**ocr.inner(),
        extractor,
        &**backend.inner(),
        config.ocr_language(),
    );
    let outcome = pipeline.run(&image, &ProgressReporter::logging()).await?;

    if outcome.verdict == ExistenceVerdict::Exists {
        cookies.add_private(IdentityContext::new(outcome.national_id.clone()).into_cookie());
    }
    Ok(Json(outcome))
}

#[delete("/identity")]
pub fn forget(cookies: &CookieJar<'_>) {
    IdentityContext::clear(cookies);
}
