use log::{info, warn};

use crate::{backend::VotingBackend, error::Error, model::payload::VotePayload};

/// How the voting-record service answered one transmission.
#[derive(Debug)]
pub enum SubmissionOutcome {
    Accepted,
    /// Always an [`Error::Voting`].
    Rejected(Error),
}

/// Sends finalized ballots to the voting-record service. One call, one
/// transmission; nothing is retried here.
pub struct VoteSubmitter<'a> {
    backend: &'a dyn VotingBackend,
}

impl<'a> VoteSubmitter<'a> {
    pub fn new(backend: &'a dyn VotingBackend) -> Self {
        Self { backend }
    }

    pub async fn submit(&self, payload: &VotePayload) -> SubmissionOutcome {
        let id = payload.submission_id();
        info!("Submitting vote {id}");
        let result = match payload {
            VotePayload::List(vote) => self.backend.submit_list_vote(vote).await,
            VotePayload::Party(vote) => self.backend.submit_party_vote(vote).await,
        };
        match result {
            Ok(()) => {
                info!("Vote {id} accepted");
                SubmissionOutcome::Accepted
            }
            Err(e) => {
                warn!("Vote {id} not recorded: {e}");
                SubmissionOutcome::Rejected(Error::Voting(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::fake::FakeBackend,
        model::{
            payload::{PartyVote, SubmissionId},
            selection::Choice,
            voter::Voter,
        },
    };

    fn party_payload() -> VotePayload {
        VotePayload::Party(PartyVote::new(
            &Voter::example(),
            &Choice::Concrete("P2".to_string()),
            SubmissionId::random(),
        ))
    }

    #[rocket::async_test]
    async fn accepted_vote_is_recorded_once() {
        let backend = FakeBackend::example();
        let outcome = VoteSubmitter::new(&backend).submit(&party_payload()).await;
        assert!(matches!(outcome, SubmissionOutcome::Accepted));
        assert_eq!(backend.party_votes().len(), 1);
        assert!(backend.list_votes().is_empty());
    }

    #[rocket::async_test]
    async fn rejection_is_a_voting_error() {
        let backend = FakeBackend::example();
        backend.set_reject_votes(Some("already voted"));
        let outcome = VoteSubmitter::new(&backend).submit(&party_payload()).await;
        assert!(matches!(
            outcome,
            SubmissionOutcome::Rejected(Error::Voting(_))
        ));
        assert!(backend.party_votes().is_empty());
    }
}
