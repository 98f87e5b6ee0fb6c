use log::{error, warn};
use rocket::{
    http::Status,
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    backend::BackendError,
    identity::ocr::OcrError,
    session::{gate::ConfirmationTicket, store::SessionId, Phase},
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ocr(#[from] OcrError),
    #[error("No labelled national id in the recognized text")]
    IdentityNotFound,
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(BackendError),
    #[error(transparent)]
    CatalogFetch(CatalogFailure),
    #[error("Vote not recorded: {0}")]
    Voting(BackendError),
    #[error("No verified identity for this client")]
    MissingIdentity,
    #[error("Cannot {operation} while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: Phase,
    },
    #[error("Ballot is neither a complete choice nor blank")]
    SelectionIncomplete,
    #[error("Confirmation ticket {0} is not open")]
    UnknownTicket(ConfirmationTicket),
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),
    #[error("Result of a superseded operation discarded")]
    StaleCompletion,
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Why the data a voting screen depends on could not be loaded.
#[derive(Debug, Error)]
pub enum CatalogFailure {
    #[error("Voter profile not in registry")]
    ProfileMissing,
    #[error("Voter profile unavailable: {0}")]
    ProfileUnavailable(BackendError),
    #[error("Candidate catalog unavailable: {0}")]
    CandidatesUnavailable(BackendError),
    #[error("Party catalog unavailable: {0}")]
    PartiesUnavailable(BackendError),
}

impl Error {
    /// The message shown to the voter.
    pub fn user_message(&self) -> String {
        match self {
            Self::Ocr(_) => "حدث خطأ أثناء معالجة الصورة. الرجاء المحاولة مرة أخرى.",
            Self::IdentityNotFound => "لم يتم استخراج الرقم الوطني. يرجى التحقق من الصورة.",
            Self::RegistryUnavailable(_) => {
                "حدث خطأ أثناء التحقق من الرقم الوطني. الرجاء المحاولة مرة أخرى."
            }
            Self::CatalogFetch(CatalogFailure::ProfileMissing) => "الرقم الوطني غير موجود.",
            Self::CatalogFetch(CatalogFailure::ProfileUnavailable(_)) => {
                "فشل في استرجاع بيانات المستخدم."
            }
            Self::CatalogFetch(CatalogFailure::CandidatesUnavailable(_)) => {
                "فشل في جلب البيانات. يرجى المحاولة مرة أخرى."
            }
            Self::CatalogFetch(CatalogFailure::PartiesUnavailable(_)) => "فشل في استرجاع الأحزاب.",
            Self::Voting(_) => "خطأ في تسجيل التصويت. يرجى المحاولة مرة أخرى.",
            Self::MissingIdentity => "الرقم الوطني غير موجود في التخزين.",
            Self::InvalidTransition { .. } => "لا يمكن تنفيذ هذا الإجراء الآن.",
            Self::SelectionIncomplete => "يرجى اختيار قائمة أو حزب، أو التصويت بورقة بيضاء.",
            Self::UnknownTicket(_) => "انتهت صلاحية طلب التأكيد.",
            Self::SessionNotFound(_) => "جلسة التصويت غير موجودة.",
            Self::StaleCompletion => "تم تجاهل نتيجة عملية سابقة.",
            Self::BadRequest(_) => "طلب غير صالح.",
        }
        .to_string()
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Ocr(_) | Self::IdentityNotFound => Status::UnprocessableEntity,
            Self::CatalogFetch(CatalogFailure::ProfileMissing) | Self::SessionNotFound(_) => {
                Status::NotFound
            }
            Self::RegistryUnavailable(_) | Self::CatalogFetch(_) | Self::Voting(_) => {
                Status::BadGateway
            }
            Self::MissingIdentity => Status::Unauthorized,
            Self::InvalidTransition { .. }
            | Self::SelectionIncomplete
            | Self::UnknownTicket(_)
            | Self::StaleCompletion => Status::Conflict,
            Self::BadRequest(_) => Status::BadRequest,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        Custom(
            status,
            Json(ErrorBody {
                error: self.user_message(),
            }),
        )
        .respond_to(req)
    }
}
