//! From a photographed id card to a registry verdict.
//!
//! image -> [`TextRecognition`] -> [`NationalIdExtractor`] -> [`RegistryLookup::exists`]

use log::{info, warn};
use serde::Serialize;

use crate::{
    backend::{RegistryLookup, VotingBackend},
    error::{Error, Result},
    model::voter::NationalId,
};

pub mod extract;
pub mod ocr;

use self::{
    extract::NationalIdExtractor,
    ocr::{ProgressReporter, TextRecognition},
};

/// Whether a claimed national id is in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistenceVerdict {
    #[default]
    Unknown,
    Exists,
    Absent,
}

/// What one OCR attempt produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityClaim {
    pub raw_text: String,
    pub extracted_id: Option<NationalId>,
}

/// A resolved identity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityOutcome {
    pub national_id: NationalId,
    pub verdict: ExistenceVerdict,
}

/// The three identity stages wired together for one request.
pub struct IdentityPipeline<'a> {
    ocr: &'a dyn TextRecognition,
    extractor: &'a NationalIdExtractor,
    registry: RegistryLookup<'a>,
    language: &'a str,
}

impl<'a> IdentityPipeline<'a> {
    pub fn new(
        ocr: &'a dyn TextRecognition,
        extractor: &'a NationalIdExtractor,
        backend: &'a dyn VotingBackend,
        language: &'a str,
    ) -> Self {
        Self {
            ocr,
            extractor,
            registry: RegistryLookup::new(backend),
            language,
        }
    }

    /// Recognize the text on `image` and parse out the labelled id.
    pub async fn claim(&self, image: &[u8], progress: &ProgressReporter) -> Result<IdentityClaim> {
        let raw_text = self
            .ocr
            .recognize(image, self.language, progress)
            .await
            .map_err(|e| {
                warn!("OCR failed: {e}");
                Error::Ocr(e)
            })?;
        let extracted_id = self.extractor.extract(&raw_text);
        Ok(IdentityClaim {
            raw_text,
            extracted_id,
        })
    }

    /// Run the whole pipeline. The registry is only consulted once an id has
    /// been extracted.
    pub async fn run(&self, image: &[u8], progress: &ProgressReporter) -> Result<IdentityOutcome> {
        let claim = self.claim(image, progress).await?;
        let national_id = claim.extracted_id.ok_or_else(|| {
            info!("No national id in {} recognized characters", claim.raw_text.chars().count());
            Error::IdentityNotFound
        })?;
        let verdict = self.registry.exists(&national_id).await?;
        Ok(IdentityOutcome {
            national_id,
            verdict,
        })
    }
}

/// Identifies one upload to an [`IdentityCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadStamp(u64);

/// The identity panel of a voting screen. Each upload resets the verdict to
/// `Unknown`; only the result of the most recent upload may set it again.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentityCheck {
    #[serde(skip)]
    uploads: u64,
    #[serde(skip)]
    pending: Option<UploadStamp>,
    national_id: Option<NationalId>,
    verdict: ExistenceVerdict,
    error: Option<String>,
}

impl IdentityCheck {
    pub fn begin_upload(&mut self) -> UploadStamp {
        self.uploads += 1;
        let stamp = UploadStamp(self.uploads);
        self.pending = Some(stamp);
        self.national_id = None;
        self.verdict = ExistenceVerdict::Unknown;
        self.error = None;
        stamp
    }

    /// Apply the result of the upload identified by `stamp`. Results of
    /// superseded uploads are discarded with [`Error::StaleCompletion`].
    pub fn resolve(
        &mut self,
        stamp: UploadStamp,
        result: Result<IdentityOutcome>,
    ) -> Result<IdentityOutcome> {
        if self.pending != Some(stamp) {
            warn!("Discarding identity result for superseded upload {}", stamp.0);
            return Err(Error::StaleCompletion);
        }
        self.pending = None;
        match result {
            Ok(outcome) => {
                self.national_id = Some(outcome.national_id.clone());
                self.verdict = outcome.verdict;
                Ok(outcome)
            }
            Err(e) => {
                self.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub fn verdict(&self) -> ExistenceVerdict {
        self.verdict
    }
}
