#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::{
    config::{BackendFairing, ConfigFairing, OcrFairing},
    identity::extract::NationalIdExtractor,
    logging::LoggerFairing,
};

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;
pub mod session;

/// Assemble the server: routes, configuration, the external voting service
/// and the recognition engine.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(BackendFairing)
        .attach(OcrFairing)
        .manage(NationalIdExtractor::default())
}

/// As [`build`], with scripted stand-ins for the voting service and the
/// recognition engine.
#[cfg(test)]
pub(crate) fn rocket_with_fakes(
    backend: backend::fake::FakeBackend,
    ocr: identity::ocr::fake::FakeOcr,
) -> Rocket<Build> {
    use std::sync::Arc;

    use crate::{backend::SharedBackend, identity::ocr::SharedOcr};

    let backend: SharedBackend = Arc::new(backend);
    let ocr: SharedOcr = Arc::new(ocr);
    rocket::build()
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(backend)
        .manage(ocr)
        .manage(NationalIdExtractor::default())
}
