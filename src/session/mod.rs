//! Voting sessions: the state of one ballot screen, from loading the voter's
//! catalog to the voter acknowledging the result.
//!
//! ```text
//! Idle -> Loading -> Ready -> Selecting <-> ConfirmPending -> Submitting
//!            |                   ^                               |
//!            v                   +---------- Failure <-----------+
//!         Blocked                                                |
//!                                Success -> ReturnPending <------+
//! ```
//!
//! A session's track (circle list or party) is a type parameter, so only the
//! selection operations that make sense for the track exist on it.

use std::fmt::{Debug, Display, Formatter};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    backend::RegistryLookup,
    error::{Error, Result},
    identity::IdentityCheck,
    model::{
        catalog::{ListCatalog, PartyCatalog},
        payload::{ListVote, PartyVote, SubmissionId, VotePayload},
        selection::{Choice, ListPick},
        voter::{IdentityContext, NationalId, Voter},
    },
};

pub mod gate;
pub mod store;
pub mod submit;

use self::{
    gate::{ConfirmationGate, ConfirmationTicket},
    store::{AnySession, AnyView, SessionId},
    submit::SubmissionOutcome,
};

/// Shown after the voter backs out of the confirmation prompt.
pub const CANCELLED_NOTICE: &str = "تم إلغاء التصويت.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Selecting,
    ConfirmPending,
    Submitting,
    Success,
    Failure,
    ReturnPending,
    /// Profile or catalog could not be loaded; only a reload is possible.
    Blocked,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Selecting => "selecting",
            Self::ConfirmPending => "awaiting confirmation",
            Self::Submitting => "submitting",
            Self::Success => "recorded",
            Self::Failure => "not recorded",
            Self::ReturnPending => "returning",
            Self::Blocked => "blocked",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    List,
    Party,
}

/// Stamps one asynchronous operation on a session. Completions carrying an
/// older stamp than the session's current one are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// An election track: what its catalog and picks look like, and how a
/// finished ballot goes on the wire.
#[rocket::async_trait]
pub trait Track: Sized + Send + Sync + 'static {
    type Catalog: Debug + Clone + Serialize + Send + Sync;
    type Pick: Debug + Clone + Serialize + Send + Sync;

    const KIND: TrackKind;
    const SUCCESS_NOTICE: &'static str;
    /// Shown when the voting service refuses the ballot.
    const FAILURE_NOTICE: &'static str;

    /// The part of the catalog that `voter` may vote from.
    async fn fetch_catalog(registry: RegistryLookup<'_>, voter: &Voter) -> Result<Self::Catalog>;

    fn payload(voter: &Voter, choice: &Choice<Self::Pick>, id: SubmissionId) -> VotePayload;

    fn wrap(session: VotingSession<Self>) -> AnySession;

    fn narrow(session: &mut AnySession) -> Option<&mut VotingSession<Self>>;

    fn wrap_view(view: SessionView<Self>) -> AnyView;
}

/// The city/circle candidate-list ballot.
#[derive(Debug)]
pub struct ListTrack;

#[rocket::async_trait]
impl Track for ListTrack {
    type Catalog = ListCatalog;
    type Pick = ListPick;

    const KIND: TrackKind = TrackKind::List;
    const SUCCESS_NOTICE: &'static str = "تم تسجيل تصويتك بنجاح. شكرًا لمشاركتك!";
    const FAILURE_NOTICE: &'static str = "خطأ في تسجيل التصويت. يرجى المحاولة مرة أخرى.";

    async fn fetch_catalog(registry: RegistryLookup<'_>, voter: &Voter) -> Result<ListCatalog> {
        registry.candidates_for(&voter.city, &voter.circle).await
    }

    fn payload(voter: &Voter, choice: &Choice<ListPick>, id: SubmissionId) -> VotePayload {
        VotePayload::List(ListVote::new(voter, choice, id))
    }

    fn wrap(session: VotingSession<Self>) -> AnySession {
        AnySession::List(session)
    }

    fn narrow(session: &mut AnySession) -> Option<&mut VotingSession<Self>> {
        match session {
            AnySession::List(session) => Some(session),
            _ => None,
        }
    }

    fn wrap_view(view: SessionView<Self>) -> AnyView {
        AnyView::List(view)
    }
}

/// The national party ballot.
#[derive(Debug)]
pub struct PartyTrack;

#[rocket::async_trait]
impl Track for PartyTrack {
    type Catalog = PartyCatalog;
    type Pick = String;

    const KIND: TrackKind = TrackKind::Party;
    const SUCCESS_NOTICE: &'static str = "تم تسجيل صوتك بنجاح!";
    const FAILURE_NOTICE: &'static str = "فشل في تسجيل الصوت.";

    async fn fetch_catalog(registry: RegistryLookup<'_>, _voter: &Voter) -> Result<PartyCatalog> {
        registry.parties().await
    }

    fn payload(voter: &Voter, choice: &Choice<String>, id: SubmissionId) -> VotePayload {
        VotePayload::Party(PartyVote::new(voter, choice, id))
    }

    fn wrap(session: VotingSession<Self>) -> AnySession {
        AnySession::Party(session)
    }

    fn narrow(session: &mut AnySession) -> Option<&mut VotingSession<Self>> {
        match session {
            AnySession::Party(session) => Some(session),
            _ => None,
        }
    }

    fn wrap_view(view: SessionView<Self>) -> AnyView {
        AnyView::Party(view)
    }
}

/// One voter's ballot screen on track `T`.
pub struct VotingSession<T: Track> {
    id: SessionId,
    identity: IdentityContext,
    submission_id: SubmissionId,
    generation: u64,
    phase: Phase,
    voter: Option<Voter>,
    catalog: Option<T::Catalog>,
    choice: Choice<T::Pick>,
    gate: ConfirmationGate,
    notice: Option<String>,
    identity_check: IdentityCheck,
}

/// What a client sees of a session.
#[derive(Serialize)]
#[serde(bound = "")]
pub struct SessionView<T: Track> {
    pub id: SessionId,
    pub track: TrackKind,
    pub phase: Phase,
    pub voter: Option<Voter>,
    pub catalog: Option<T::Catalog>,
    pub choice: Choice<T::Pick>,
    pub can_confirm: bool,
    pub submission_id: SubmissionId,
    pub notice: Option<String>,
    pub identity_check: IdentityCheck,
}

impl<T: Track> VotingSession<T> {
    pub fn new(identity: IdentityContext) -> Self {
        Self {
            id: SessionId::random(),
            identity,
            submission_id: SubmissionId::random(),
            generation: 0,
            phase: Phase::Idle,
            voter: None,
            catalog: None,
            choice: Choice::default(),
            gate: ConfirmationGate::default(),
            notice: None,
            identity_check: IdentityCheck::default(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &IdentityContext {
        &self.identity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn choice(&self) -> &Choice<T::Pick> {
        &self.choice
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn identity_check_mut(&mut self) -> &mut IdentityCheck {
        &mut self.identity_check
    }

    fn expect_phase(&self, operation: &'static str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                operation,
                phase: self.phase,
            })
        }
    }

    fn check_generation(&self, generation: Generation, phase: Phase) -> Result<()> {
        if generation.0 == self.generation && self.phase == phase {
            Ok(())
        } else {
            warn!("Session {}: discarding completion of superseded operation", self.id);
            Err(Error::StaleCompletion)
        }
    }

    /// Fetch the profile, then the catalog for it. Either failing fails the load.
    pub async fn fetch(
        registry: RegistryLookup<'_>,
        national_id: &NationalId,
    ) -> Result<(Voter, T::Catalog)> {
        let voter = registry.voter(national_id).await?;
        let catalog = T::fetch_catalog(registry, &voter).await?;
        Ok((voter, catalog))
    }

    /// Start (or, from `Blocked`, restart) loading the screen's data.
    pub fn begin_loading(&mut self) -> Result<Generation> {
        self.expect_phase("load the ballot", &[Phase::Idle, Phase::Blocked])?;
        self.generation += 1;
        self.phase = Phase::Loading;
        self.notice = None;
        Ok(Generation(self.generation))
    }

    /// Apply a load result. A failed load blocks the whole screen.
    pub fn finish_loading(
        &mut self,
        generation: Generation,
        loaded: Result<(Voter, T::Catalog)>,
    ) -> Result<()> {
        self.check_generation(generation, Phase::Loading)?;
        match loaded {
            Ok((voter, catalog)) => {
                info!("Session {}: {:?} ballot ready for {}", self.id, T::KIND, voter.national_id);
                self.voter = Some(voter);
                self.catalog = Some(catalog);
                self.phase = Phase::Ready;
            }
            Err(e) => {
                warn!("Session {}: blocked: {e}", self.id);
                self.notice = Some(e.user_message());
                self.phase = Phase::Blocked;
            }
        }
        Ok(())
    }

    fn check_editable(&self, operation: &'static str) -> Result<()> {
        self.expect_phase(
            operation,
            &[Phase::Ready, Phase::Selecting, Phase::Failure],
        )
    }

    /// Any accepted edit, including one after a failed submission, puts the
    /// screen in `Selecting`.
    fn edited(&mut self) {
        self.phase = Phase::Selecting;
        self.notice = None;
    }

    pub fn set_blank(&mut self, blank: bool) -> Result<()> {
        self.check_editable("change the blank ballot")?;
        self.choice.set_blank(blank);
        self.edited();
        Ok(())
    }

    /// A ballot can be confirmed once it is blank or names a list or party.
    /// A list with no candidates ticked is still a vote for the list.
    pub fn can_confirm(&self) -> bool {
        !matches!(self.choice, Choice::Undecided)
    }

    pub fn request_confirmation(&mut self) -> Result<ConfirmationTicket> {
        self.expect_phase(
            "ask for confirmation",
            &[Phase::Ready, Phase::Selecting, Phase::Failure],
        )?;
        if !self.can_confirm() {
            return Err(Error::SelectionIncomplete);
        }
        self.phase = Phase::ConfirmPending;
        self.notice = None;
        Ok(self.gate.open())
    }

    pub fn cancel_confirmation(&mut self) -> Result<()> {
        self.expect_phase("cancel confirmation", &[Phase::ConfirmPending])?;
        self.gate.close();
        self.phase = Phase::Selecting;
        self.notice = Some(CANCELLED_NOTICE.to_string());
        Ok(())
    }

    /// Pass the gate with `ticket` and freeze the ballot into a payload.
    /// The session stays in `Submitting` until the matching
    /// [`complete_submission`](Self::complete_submission).
    pub fn confirm(&mut self, ticket: ConfirmationTicket) -> Result<(Generation, VotePayload)> {
        self.expect_phase("confirm", &[Phase::ConfirmPending])?;
        let voter = self.voter.as_ref().ok_or(Error::InvalidTransition {
            operation: "confirm",
            phase: self.phase,
        })?;
        if !self.gate.redeem(ticket) {
            return Err(Error::UnknownTicket(ticket));
        }
        let payload = T::payload(voter, &self.choice, self.submission_id);
        self.generation += 1;
        self.phase = Phase::Submitting;
        Ok((Generation(self.generation), payload))
    }

    pub fn complete_submission(
        &mut self,
        generation: Generation,
        outcome: SubmissionOutcome,
    ) -> Result<()> {
        self.check_generation(generation, Phase::Submitting)?;
        match outcome {
            SubmissionOutcome::Accepted => {
                self.phase = Phase::Success;
                self.notice = Some(T::SUCCESS_NOTICE.to_string());
            }
            SubmissionOutcome::Rejected(e) => {
                self.phase = Phase::Failure;
                self.notice = Some(match e {
                    Error::Voting(_) => T::FAILURE_NOTICE.to_string(),
                    e => e.user_message(),
                });
            }
        }
        Ok(())
    }

    pub fn acknowledge(&mut self) -> Result<()> {
        self.expect_phase("acknowledge", &[Phase::Success])?;
        self.phase = Phase::ReturnPending;
        Ok(())
    }

    pub fn view(&self) -> SessionView<T> {
        SessionView {
            id: self.id,
            track: T::KIND,
            phase: self.phase,
            voter: self.voter.clone(),
            catalog: self.catalog.clone(),
            choice: self.choice.clone(),
            can_confirm: self.can_confirm(),
            submission_id: self.submission_id,
            notice: self.notice.clone(),
            identity_check: self.identity_check.clone(),
        }
    }
}

impl VotingSession<ListTrack> {
    /// Choose a list. Any candidates ticked on the previous list are dropped.
    /// Ignored while the ballot is blank.
    pub fn select_list(&mut self, list: &str) -> Result<()> {
        self.check_editable("select a list")?;
        if self.choice.is_blank() {
            debug!("Session {}: list ignored on blank ballot", self.id);
            return Ok(());
        }
        let known = self
            .catalog
            .as_ref()
            .map_or(false, |catalog| catalog.list(list).is_some());
        if !known {
            return Err(Error::BadRequest(format!("no list {list:?} in this circle")));
        }
        self.choice = Choice::Concrete(ListPick::new(list));
        self.edited();
        Ok(())
    }

    /// Tick or untick a candidate of the chosen list. Returns whether the
    /// candidate is now ticked. Ignored while the ballot is blank.
    pub fn toggle_candidate(&mut self, candidate_id: &str) -> Result<bool> {
        self.check_editable("pick a candidate")?;
        if self.choice.is_blank() {
            debug!("Session {}: candidate ignored on blank ballot", self.id);
            return Ok(false);
        }
        let Some(pick) = self.choice.concrete_mut() else {
            return Err(Error::BadRequest("choose a list first".to_string()));
        };
        let candidate = self
            .catalog
            .as_ref()
            .and_then(|catalog| catalog.list(pick.list()))
            .and_then(|list| list.candidate(candidate_id))
            .ok_or_else(|| {
                Error::BadRequest(format!(
                    "no candidate {candidate_id:?} on list {:?}",
                    pick.list()
                ))
            })?;
        let picked = pick.toggle(candidate);
        self.edited();
        Ok(picked)
    }
}

impl VotingSession<PartyTrack> {
    /// Choose a party. Ignored while the ballot is blank.
    pub fn select_party(&mut self, party: &str) -> Result<()> {
        self.check_editable("select a party")?;
        if self.choice.is_blank() {
            debug!("Session {}: party ignored on blank ballot", self.id);
            return Ok(());
        }
        let known = self
            .catalog
            .as_ref()
            .map_or(false, |catalog| catalog.contains(party));
        if !known {
            return Err(Error::BadRequest(format!("no party {party:?} on the ballot")));
        }
        self.choice = Choice::Concrete(party.to_string());
        self.edited();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::{
        backend::{fake::FakeBackend, BackendError},
        error::CatalogFailure,
        model::catalog::{Candidate, CityCatalog, Party},
    };

    fn list_session() -> VotingSession<ListTrack> {
        let mut session = VotingSession::<ListTrack>::new(IdentityContext::example());
        let generation = session.begin_loading().unwrap();
        let catalog = ListCatalog::scoped(CityCatalog::example(), "Tunis", "A");
        session
            .finish_loading(generation, Ok((Voter::example(), catalog)))
            .unwrap();
        session
    }

    fn party_session() -> VotingSession<PartyTrack> {
        let mut session = VotingSession::<PartyTrack>::new(IdentityContext::example());
        let generation = session.begin_loading().unwrap();
        let catalog = PartyCatalog::new(Party::example_list(3));
        session
            .finish_loading(generation, Ok((Voter::example(), catalog)))
            .unwrap();
        session
    }

    fn id(digits: &str) -> NationalId {
        digits.parse().unwrap()
    }

    fn submit(session: &mut VotingSession<impl Track>) -> (Generation, VotePayload) {
        let ticket = session.request_confirmation().unwrap();
        session.confirm(ticket).unwrap()
    }

    #[test]
    fn selection_waits_for_loading() {
        let mut session = VotingSession::<ListTrack>::new(IdentityContext::example());
        assert!(matches!(
            session.select_list("L1"),
            Err(Error::InvalidTransition {
                phase: Phase::Idle,
                ..
            })
        ));
        session.begin_loading().unwrap();
        assert!(matches!(
            session.set_blank(true),
            Err(Error::InvalidTransition {
                phase: Phase::Loading,
                ..
            })
        ));
    }

    #[test]
    fn failed_load_blocks_until_reloaded() {
        let mut session = VotingSession::<ListTrack>::new(IdentityContext::example());
        let generation = session.begin_loading().unwrap();
        session
            .finish_loading(
                generation,
                Err(Error::CatalogFetch(CatalogFailure::ProfileMissing)),
            )
            .unwrap();
        assert_eq!(session.phase(), Phase::Blocked);
        assert_eq!(session.notice(), Some("الرقم الوطني غير موجود."));
        assert!(session.request_confirmation().is_err());

        let generation = session.begin_loading().unwrap();
        let catalog = ListCatalog::scoped(CityCatalog::example(), "Tunis", "A");
        session
            .finish_loading(generation, Ok((Voter::example(), catalog)))
            .unwrap();
        assert_eq!(session.phase(), Phase::Ready);
        assert_eq!(session.notice(), None);
    }

    #[test]
    fn superseded_load_is_discarded() {
        let mut session = VotingSession::<ListTrack>::new(IdentityContext::example());
        let first = session.begin_loading().unwrap();
        session
            .finish_loading(first, Err(Error::CatalogFetch(CatalogFailure::ProfileMissing)))
            .unwrap();
        let _second = session.begin_loading().unwrap();

        let catalog = ListCatalog::scoped(CityCatalog::example(), "Tunis", "A");
        assert!(matches!(
            session.finish_loading(first, Ok((Voter::example(), catalog))),
            Err(Error::StaleCompletion)
        ));
        assert_eq!(session.phase(), Phase::Loading);
    }

    #[test]
    fn switching_lists_drops_candidates() {
        let mut session = list_session();
        session.select_list("L1").unwrap();
        assert!(session.toggle_candidate("c1").unwrap());
        session.select_list("L2").unwrap();
        let pick = session.choice().concrete().unwrap();
        assert_eq!(pick.list(), "L2");
        assert!(pick.candidates().is_empty());
    }

    #[test]
    fn reselecting_same_list_also_resets() {
        let mut session = list_session();
        session.select_list("L1").unwrap();
        session.toggle_candidate("c2").unwrap();
        session.select_list("L1").unwrap();
        assert!(session.choice().concrete().unwrap().candidates().is_empty());
    }

    #[test]
    fn candidates_must_belong_to_chosen_list() {
        let mut session = list_session();
        assert!(matches!(
            session.toggle_candidate("c1"),
            Err(Error::BadRequest(_))
        ));
        session.select_list("L2").unwrap();
        // Candidate c1 stands on L1.
        assert!(matches!(
            session.toggle_candidate("c1"),
            Err(Error::BadRequest(_))
        ));
        assert!(session.toggle_candidate("c3").unwrap());
    }

    #[test]
    fn unknown_list_is_rejected() {
        let mut session = list_session();
        // L5 belongs to circle B.
        assert!(session.select_list("L5").is_err());
        assert_eq!(*session.choice(), Choice::Undecided);
    }

    #[test]
    fn toggle_pair_is_identity() {
        let mut session = list_session();
        session.select_list("L1").unwrap();
        session.toggle_candidate("c1").unwrap();
        let before = session.choice().clone();
        session.toggle_candidate("c2").unwrap();
        session.toggle_candidate("c2").unwrap();
        assert_eq!(*session.choice(), before);
    }

    #[test]
    fn blank_clears_everything() {
        let mut session = list_session();
        session.select_list("L1").unwrap();
        session.toggle_candidate("c1").unwrap();
        session.set_blank(true).unwrap();
        assert_eq!(*session.choice(), Choice::Blank);

        // Concrete edits are ignored while blank.
        session.select_list("L2").unwrap();
        assert!(!session.toggle_candidate("c3").unwrap());
        assert_eq!(*session.choice(), Choice::Blank);

        // Clearing blank does not bring the old pick back.
        session.set_blank(false).unwrap();
        assert_eq!(*session.choice(), Choice::Undecided);
    }

    #[test]
    fn confirmation_needs_exactly_one_kind_of_ballot() {
        let mut session = list_session();
        assert!(!session.can_confirm());
        assert!(matches!(
            session.request_confirmation(),
            Err(Error::SelectionIncomplete)
        ));
        assert_eq!(session.phase(), Phase::Ready);

        session.select_list("L1").unwrap();
        assert!(session.can_confirm());

        session.set_blank(true).unwrap();
        assert!(session.can_confirm());

        session.set_blank(false).unwrap();
        assert!(!session.can_confirm());
    }

    #[test]
    fn cancel_keeps_selection() {
        let mut session = party_session();
        session.select_party("P2").unwrap();
        session.request_confirmation().unwrap();
        assert!(session.select_party("P3").is_err());

        session.cancel_confirmation().unwrap();
        assert_eq!(session.phase(), Phase::Selecting);
        assert_eq!(session.notice(), Some(CANCELLED_NOTICE));
        assert_eq!(session.choice().concrete().map(String::as_str), Some("P2"));
    }

    #[test]
    fn cancelled_ticket_cannot_confirm() {
        let mut session = party_session();
        session.select_party("P1").unwrap();
        let ticket = session.request_confirmation().unwrap();
        session.cancel_confirmation().unwrap();
        let fresh = session.request_confirmation().unwrap();

        assert!(matches!(
            session.confirm(ticket),
            Err(Error::UnknownTicket(_))
        ));
        assert_eq!(session.phase(), Phase::ConfirmPending);
        session.confirm(fresh).unwrap();
    }

    #[test]
    fn confirm_is_single_flight() {
        let mut session = party_session();
        session.select_party("P1").unwrap();
        let ticket = session.request_confirmation().unwrap();
        session.confirm(ticket).unwrap();
        assert!(matches!(
            session.confirm(ticket),
            Err(Error::InvalidTransition {
                phase: Phase::Submitting,
                ..
            })
        ));
        assert!(session.request_confirmation().is_err());
    }

    #[test]
    fn list_payload_matches_selection() {
        let mut session = list_session();
        session.select_list("L1").unwrap();
        session.toggle_candidate("c1").unwrap();
        let (_, payload) = submit(&mut session);
        let VotePayload::List(vote) = payload else {
            panic!("expected a list vote");
        };
        assert_eq!(vote.candidate.candidate_national_ids, vec!["c1".to_string()]);
        assert_eq!(vote.candidate.circle_list, "L1");
        assert_eq!(vote.candidate.city, "Tunis");
        assert_eq!(vote.candidate.circle, "A");
        assert_eq!(vote.user, Voter::example());
    }

    #[test]
    fn blank_list_payload_is_empty() {
        let mut session = list_session();
        session.set_blank(true).unwrap();
        let (_, payload) = submit(&mut session);
        let VotePayload::List(vote) = payload else {
            panic!("expected a list vote");
        };
        assert!(vote.candidate.candidate_national_ids.is_empty());
        assert_eq!(vote.candidate.circle_list, "");
    }

    #[test]
    fn success_then_acknowledge() {
        let mut session = party_session();
        session.set_blank(true).unwrap();
        let (generation, _) = submit(&mut session);
        session
            .complete_submission(generation, SubmissionOutcome::Accepted)
            .unwrap();
        assert_eq!(session.phase(), Phase::Success);
        assert_eq!(session.notice(), Some(PartyTrack::SUCCESS_NOTICE));

        // The ballot is spent.
        assert!(session.set_blank(false).is_err());
        assert!(session.request_confirmation().is_err());

        session.acknowledge().unwrap();
        assert_eq!(session.phase(), Phase::ReturnPending);
        assert!(session.acknowledge().is_err());
    }

    #[test]
    fn failure_returns_to_selecting_with_same_submission_id() {
        let mut session = party_session();
        session.select_party("P1").unwrap();
        let (generation, first) = submit(&mut session);
        let rejected = Error::Voting(BackendError::Status(StatusCode::BAD_GATEWAY));
        session
            .complete_submission(generation, SubmissionOutcome::Rejected(rejected))
            .unwrap();
        assert_eq!(session.phase(), Phase::Failure);
        assert_eq!(session.notice(), Some("فشل في تسجيل الصوت."));

        session.select_party("P3").unwrap();
        assert_eq!(session.phase(), Phase::Selecting);
        let (_, second) = submit(&mut session);
        assert_eq!(first.submission_id(), second.submission_id());
    }

    #[test]
    fn retry_straight_from_failure() {
        let mut session = list_session();
        session.set_blank(true).unwrap();
        let (generation, _) = submit(&mut session);
        session
            .complete_submission(
                generation,
                SubmissionOutcome::Rejected(Error::Voting(BackendError::Rejected(
                    "busy".to_string(),
                ))),
            )
            .unwrap();
        assert_eq!(session.notice(), Some(ListTrack::FAILURE_NOTICE));
        assert!(session.request_confirmation().is_ok());
    }

    #[test]
    fn stale_submission_result_is_discarded() {
        let mut session = party_session();
        session.select_party("P1").unwrap();
        let (generation, _) = submit(&mut session);
        session
            .complete_submission(generation, SubmissionOutcome::Accepted)
            .unwrap();
        assert!(matches!(
            session.complete_submission(generation, SubmissionOutcome::Accepted),
            Err(Error::StaleCompletion)
        ));
    }

    #[test]
    fn unknown_party_is_rejected() {
        let mut session = party_session();
        assert!(session.select_party("P9").is_err());
        assert!(session.select_party("P3").is_ok());
    }

    #[rocket::async_test]
    async fn fetch_scopes_catalog_to_voter() {
        let backend = FakeBackend::example();
        let registry = RegistryLookup::new(&backend);
        let (voter, catalog) = VotingSession::<ListTrack>::fetch(registry, &id("98765"))
            .await
            .unwrap();
        assert_eq!(voter, Voter::example2());
        assert_eq!(catalog.city, "Sfax");
        assert_eq!(catalog.lists[0].list, "L9");
        assert_eq!(
            catalog.lists[0].candidates,
            vec![Candidate::example("c9", "Hedi Mansour")]
        );
    }

    #[rocket::async_test]
    async fn fetch_stops_at_missing_profile() {
        let backend = FakeBackend::example();
        backend.set_parties_down(true);
        let registry = RegistryLookup::new(&backend);
        let result = VotingSession::<PartyTrack>::fetch(registry, &id("11111")).await;
        assert!(matches!(
            result,
            Err(Error::CatalogFetch(CatalogFailure::ProfileMissing))
        ));
        let result = VotingSession::<PartyTrack>::fetch(registry, &id("12345")).await;
        assert!(matches!(
            result,
            Err(Error::CatalogFetch(CatalogFailure::PartiesUnavailable(_)))
        ));
    }
}
