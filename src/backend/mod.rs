//! Access to the external voter registry and voting-record service.
//!
//! The service only offers whole-collection reads, so point lookups such as
//! [`RegistryLookup::exists`] scan the full voter list. Callers only see the
//! lookup contract, which lets a filtered endpoint replace the scan later.

use std::sync::Arc;

use log::{info, warn};
use reqwest::StatusCode;
use thiserror::Error;

use crate::{
    error::{CatalogFailure, Error, Result},
    identity::ExistenceVerdict,
    model::{
        catalog::{CityCatalog, ListCatalog, Party, PartyCatalog},
        payload::{ListVote, PartyVote},
        voter::{NationalId, Voter},
    },
};

pub mod http;

#[cfg(test)]
pub mod fake;

/// Failures talking to the external service, before they are classified by
/// the component that made the call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Could not reach voting service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Voting service answered {0}")]
    Status(StatusCode),
    #[error("Malformed response from voting service: {0}")]
    Malformed(String),
    #[error("Voting service rejected the vote: {0}")]
    Rejected(String),
}

/// The operations consumed from the external registry and voting-record service.
#[rocket::async_trait]
pub trait VotingBackend: Send + Sync {
    /// `GET /api/voting/users`
    async fn voters(&self) -> std::result::Result<Vec<Voter>, BackendError>;

    /// `GET /api/voting/candidates-by-city`
    async fn city_catalog(&self) -> std::result::Result<Vec<CityCatalog>, BackendError>;

    /// `GET /parties`
    async fn parties(&self) -> std::result::Result<Vec<Party>, BackendError>;

    /// `PATCH /api/voting/votedcircle`
    async fn submit_list_vote(&self, vote: &ListVote) -> std::result::Result<(), BackendError>;

    /// `PATCH /votedparty`
    async fn submit_party_vote(&self, vote: &PartyVote) -> std::result::Result<(), BackendError>;
}

/// Shared handle placed in Rocket managed state.
pub type SharedBackend = Arc<dyn VotingBackend>;

/// Read-only lookups against the registry and catalogs.
#[derive(Clone, Copy)]
pub struct RegistryLookup<'a> {
    backend: &'a dyn VotingBackend,
}

impl<'a> RegistryLookup<'a> {
    pub fn new(backend: &'a dyn VotingBackend) -> Self {
        Self { backend }
    }

    /// Whether `id` belongs to a registered voter. An unreachable registry
    /// is an error, never `Absent`.
    pub async fn exists(&self, id: &NationalId) -> Result<ExistenceVerdict> {
        let voters = self.backend.voters().await.map_err(|e| {
            warn!("Registry lookup for {id} failed: {e}");
            Error::RegistryUnavailable(e)
        })?;
        let verdict = if voters.iter().any(|v| &v.national_id == id) {
            ExistenceVerdict::Exists
        } else {
            ExistenceVerdict::Absent
        };
        info!("Registry lookup for {id}: {verdict:?}");
        Ok(verdict)
    }

    /// The registry record for `id`, which must exist.
    pub async fn voter(&self, id: &NationalId) -> Result<Voter> {
        let voters = self
            .backend
            .voters()
            .await
            .map_err(|e| Error::CatalogFetch(CatalogFailure::ProfileUnavailable(e)))?;
        voters
            .into_iter()
            .find(|v| &v.national_id == id)
            .ok_or(Error::CatalogFetch(CatalogFailure::ProfileMissing))
    }

    /// The candidate lists for one (city, circle).
    pub async fn candidates_for(&self, city: &str, circle: &str) -> Result<ListCatalog> {
        let all = self
            .backend
            .city_catalog()
            .await
            .map_err(|e| Error::CatalogFetch(CatalogFailure::CandidatesUnavailable(e)))?;
        Ok(ListCatalog::scoped(all, city, circle))
    }

    pub async fn parties(&self) -> Result<PartyCatalog> {
        let parties = self
            .backend
            .parties()
            .await
            .map_err(|e| Error::CatalogFetch(CatalogFailure::PartiesUnavailable(e)))?;
        Ok(PartyCatalog::new(parties))
    }
}

#[cfg(test)]
mod tests {
    use super::{fake::FakeBackend, *};

    #[rocket::async_test]
    async fn exists_matches_exact_id() {
        let backend = FakeBackend::example();
        let registry = RegistryLookup::new(&backend);

        let present = "98765".parse().unwrap();
        assert_eq!(registry.exists(&present).await.unwrap(), ExistenceVerdict::Exists);

        let absent = "9876".parse().unwrap();
        assert_eq!(registry.exists(&absent).await.unwrap(), ExistenceVerdict::Absent);
    }

    #[rocket::async_test]
    async fn unreachable_registry_is_not_absent() {
        let backend = FakeBackend::example();
        backend.set_registry_down(true);
        let registry = RegistryLookup::new(&backend);

        let id = "98765".parse().unwrap();
        assert!(matches!(
            registry.exists(&id).await,
            Err(Error::RegistryUnavailable(_))
        ));
    }

    #[rocket::async_test]
    async fn missing_profile_is_distinct_from_outage() {
        let backend = FakeBackend::example();
        let registry = RegistryLookup::new(&backend);

        let unknown = "11111".parse().unwrap();
        assert!(matches!(
            registry.voter(&unknown).await,
            Err(Error::CatalogFetch(CatalogFailure::ProfileMissing))
        ));

        backend.set_registry_down(true);
        assert!(matches!(
            registry.voter(&unknown).await,
            Err(Error::CatalogFetch(CatalogFailure::ProfileUnavailable(_)))
        ));
    }

    #[rocket::async_test]
    async fn candidates_are_scoped() {
        let backend = FakeBackend::example();
        let registry = RegistryLookup::new(&backend);

        let catalog = registry.candidates_for("Sfax", "B").await.unwrap();
        assert_eq!(catalog.lists.len(), 1);
        assert_eq!(catalog.lists[0].list, "L9");
    }
}
