use std::sync::Arc;

use chrono::Duration;
use rocket::{
    data::ByteUnit,
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    backend::{http::HttpBackend, SharedBackend},
    identity::ocr::{SharedOcr, TesseractCli},
    session::store::SessionStore,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_ocr_language")]
    ocr_language: String,
    #[serde(default = "default_image_limit")]
    image_limit: u64,
    #[serde(default = "default_party_page_size")]
    party_page_size: usize,
    #[serde(default = "default_session_ttl")]
    session_ttl: u32,
}

fn default_ocr_language() -> String {
    "ara".to_string()
}

fn default_image_limit() -> u64 {
    8 * 1024 * 1024
}

fn default_party_page_size() -> usize {
    6
}

fn default_session_ttl() -> u32 {
    30 * 60
}

impl Config {
    /// Script hint for the recognition engine, matching the id card.
    pub fn ocr_language(&self) -> &str {
        &self.ocr_language
    }

    /// Largest accepted id card image.
    pub fn image_limit(&self) -> ByteUnit {
        ByteUnit::from(self.image_limit)
    }

    /// Parties per page when the client does not ask for a page size.
    pub fn party_page_size(&self) -> usize {
        self.party_page_size
    }

    /// How long an untouched voting session lives, in seconds.
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl.into())
    }
}

/// A fairing that loads the application config and puts it in managed state,
/// along with the session store it sizes.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        let sessions = SessionStore::new(config.session_ttl());
        rocket = rocket.manage(config).manage(sessions);
        Ok(rocket)
    }
}

/// Configuration for the external registry and voting-record service.
#[derive(Deserialize)]
struct BackendConfig {
    backend_url: String,
    #[serde(default = "default_request_timeout")]
    request_timeout: u64,
}

fn default_request_timeout() -> u64 {
    10
}

/// A fairing that loads the backend config, builds the HTTP client, and
/// places it into managed state as a [`SharedBackend`].
pub struct BackendFairing;

#[rocket::async_trait]
impl Fairing for BackendFairing {
    fn info(&self) -> Info {
        Info {
            name: "Voting service",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<BackendConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load voting service config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        // Construct the client.
        let timeout = std::time::Duration::from_secs(config.request_timeout);
        let backend = match HttpBackend::new(&config.backend_url, timeout) {
            Ok(backend) => backend,
            Err(e) => {
                error!("Failed to build voting service client: {e}");
                return Err(rocket);
            }
        };
        info!("Using voting service at {}", config.backend_url);

        // Manage the state.
        let backend: SharedBackend = Arc::new(backend);
        rocket = rocket.manage(backend);
        Ok(rocket)
    }
}

/// Configuration for the recognition engine.
#[derive(Deserialize)]
struct OcrConfig {
    #[serde(default = "default_tesseract_command")]
    tesseract_command: String,
}

fn default_tesseract_command() -> String {
    "tesseract".to_string()
}

/// A fairing that sets up the recognition engine and places it into managed
/// state as a [`SharedOcr`]. A missing engine is not fatal: identity checks
/// then fail with an OCR error until it is installed.
pub struct OcrFairing;

#[rocket::async_trait]
impl Fairing for OcrFairing {
    fn info(&self) -> Info {
        Info {
            name: "OCR",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<OcrConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load OCR config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let engine = TesseractCli::new(&config.tesseract_command);
        match engine.probe().await {
            Some(banner) => info!("Found recognition engine: {banner}"),
            None => warn!(
                "Recognition engine `{}` could not be run; identity checks will fail",
                config.tesseract_command
            ),
        }

        // Manage the state.
        let engine: SharedOcr = Arc::new(engine);
        rocket = rocket.manage(engine);
        Ok(rocket)
    }
}
