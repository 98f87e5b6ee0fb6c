//! In-memory stand-in for the external service, used by tests.

use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::StatusCode;

use super::{BackendError, VotingBackend};
use crate::model::{
    catalog::{CityCatalog, Party},
    payload::{ListVote, PartyVote},
    voter::Voter,
};

#[derive(Default)]
struct FakeState {
    voters: Vec<Voter>,
    cities: Vec<CityCatalog>,
    parties: Vec<Party>,
    list_votes: Vec<ListVote>,
    party_votes: Vec<PartyVote>,
    registry_down: bool,
    catalog_down: bool,
    parties_down: bool,
    reject_votes: Option<String>,
    voter_fetches: usize,
}

/// Cloning shares the same state, so a test can keep a handle on what the
/// service under test talks to.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    /// Voters 12345 (Tunis / A) and 98765 (Sfax / B), the example city
    /// catalog and eight parties.
    pub fn example() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state();
            state.voters = vec![Voter::example(), Voter::example2()];
            state.cities = CityCatalog::example();
            state.parties = Party::example_list(8);
        }
        backend
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn set_registry_down(&self, down: bool) {
        self.state().registry_down = down;
    }

    pub fn set_catalog_down(&self, down: bool) {
        self.state().catalog_down = down;
    }

    pub fn set_parties_down(&self, down: bool) {
        self.state().parties_down = down;
    }

    /// Reject every subsequent vote with `reason`, or accept again with `None`.
    pub fn set_reject_votes(&self, reason: Option<&str>) {
        self.state().reject_votes = reason.map(str::to_string);
    }

    pub fn list_votes(&self) -> Vec<ListVote> {
        self.state().list_votes.clone()
    }

    pub fn party_votes(&self) -> Vec<PartyVote> {
        self.state().party_votes.clone()
    }

    pub fn voter_fetches(&self) -> usize {
        self.state().voter_fetches
    }
}

fn unavailable() -> BackendError {
    BackendError::Status(StatusCode::SERVICE_UNAVAILABLE)
}

#[rocket::async_trait]
impl VotingBackend for FakeBackend {
    async fn voters(&self) -> Result<Vec<Voter>, BackendError> {
        let mut state = self.state();
        state.voter_fetches += 1;
        if state.registry_down {
            return Err(unavailable());
        }
        Ok(state.voters.clone())
    }

    async fn city_catalog(&self) -> Result<Vec<CityCatalog>, BackendError> {
        let state = self.state();
        if state.catalog_down {
            return Err(unavailable());
        }
        Ok(state.cities.clone())
    }

    async fn parties(&self) -> Result<Vec<Party>, BackendError> {
        let state = self.state();
        if state.parties_down {
            return Err(unavailable());
        }
        Ok(state.parties.clone())
    }

    async fn submit_list_vote(&self, vote: &ListVote) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(reason) = &state.reject_votes {
            return Err(BackendError::Rejected(reason.clone()));
        }
        state.list_votes.push(vote.clone());
        Ok(())
    }

    async fn submit_party_vote(&self, vote: &PartyVote) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(reason) = &state.reject_votes {
            return Err(BackendError::Rejected(reason.clone()));
        }
        state.party_votes.push(vote.clone());
        Ok(())
    }
}
