use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;

use super::{
    gate::ConfirmationTicket, submit::SubmissionOutcome, Generation, ListTrack, PartyTrack, Phase,
    SessionView, Track, TrackKind, VotingSession,
};
use crate::{
    backend::RegistryLookup,
    error::{Error, Result},
    identity::IdentityCheck,
    model::{
        payload::VotePayload,
        voter::{IdentityContext, Voter},
    },
};

/// Opaque, unguessable handle on a voting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u128);

impl SessionId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'a> FromParam<'a> for SessionId {
    type Error = ParseIntError;

    fn from_param(param: &'a str) -> std::result::Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for SessionId {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] SessionId);

/// A session of either track.
pub enum AnySession {
    List(VotingSession<ListTrack>),
    Party(VotingSession<PartyTrack>),
}

/// A view of a session of either track.
#[derive(Serialize)]
#[serde(untagged)]
pub enum AnyView {
    List(SessionView<ListTrack>),
    Party(SessionView<PartyTrack>),
}

macro_rules! each_track {
    ($any:expr, $session:ident => $body:expr) => {
        match $any {
            AnySession::List($session) => $body,
            AnySession::Party($session) => $body,
        }
    };
}

impl AnySession {
    pub fn id(&self) -> SessionId {
        each_track!(self, s => s.id())
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            Self::List(_) => ListTrack::KIND,
            Self::Party(_) => PartyTrack::KIND,
        }
    }

    pub fn phase(&self) -> Phase {
        each_track!(self, s => s.phase())
    }

    pub fn identity(&self) -> &IdentityContext {
        each_track!(self, s => s.identity())
    }

    pub fn identity_check_mut(&mut self) -> &mut IdentityCheck {
        each_track!(self, s => s.identity_check_mut())
    }

    pub fn begin_loading(&mut self) -> Result<Generation> {
        each_track!(self, s => s.begin_loading())
    }

    pub fn set_blank(&mut self, blank: bool) -> Result<()> {
        each_track!(self, s => s.set_blank(blank))
    }

    pub fn request_confirmation(&mut self) -> Result<ConfirmationTicket> {
        each_track!(self, s => s.request_confirmation())
    }

    pub fn cancel_confirmation(&mut self) -> Result<()> {
        each_track!(self, s => s.cancel_confirmation())
    }

    pub fn confirm(&mut self, ticket: ConfirmationTicket) -> Result<(Generation, VotePayload)> {
        each_track!(self, s => s.confirm(ticket))
    }

    pub fn complete_submission(
        &mut self,
        generation: Generation,
        outcome: SubmissionOutcome,
    ) -> Result<()> {
        each_track!(self, s => s.complete_submission(generation, outcome))
    }

    pub fn acknowledge(&mut self) -> Result<()> {
        each_track!(self, s => s.acknowledge())
    }

    pub fn view(&self) -> AnyView {
        match self {
            Self::List(s) => AnyView::List(s.view()),
            Self::Party(s) => AnyView::Party(s.view()),
        }
    }
}

struct Entry {
    session: AnySession,
    touched_at: DateTime<Utc>,
}

/// All live sessions. Sessions idle for longer than the configured TTL are
/// dropped on the next access.
///
/// The lock is never held across a call to the external service: an
/// operation takes a [`Generation`] under the lock, awaits the service
/// unlocked, and applies its result through [`SessionStore::complete`].
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn insert(&self, session: AnySession) -> SessionId {
        let id = session.id();
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            id,
            Entry {
                session,
                touched_at: Utc::now(),
            },
        );
        info!("Opened session {id}");
        id
    }

    async fn access<R>(
        &self,
        id: SessionId,
        missing: Error,
        f: impl FnOnce(&mut AnySession) -> Result<R>,
    ) -> Result<R> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        expire(&mut sessions, now, self.ttl);
        let entry = sessions.get_mut(&id).ok_or(missing)?;
        entry.touched_at = now;
        f(&mut entry.session)
    }

    /// Run a user action against session `id`.
    pub async fn with<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut AnySession) -> Result<R>,
    ) -> Result<R> {
        self.access(id, Error::SessionNotFound(id), f).await
    }

    /// As [`with`](Self::with), for actions that only exist on track `T`.
    pub async fn with_track<T: Track, R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut VotingSession<T>) -> Result<R>,
    ) -> Result<R> {
        self.with(id, |session| match T::narrow(session) {
            Some(session) => f(session),
            None => Err(Error::BadRequest(format!(
                "session {id} is not a {:?} ballot",
                T::KIND
            ))),
        })
        .await
    }

    /// Apply the result of an asynchronous operation. If the session ended
    /// meanwhile the result is discarded.
    pub async fn complete<R>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut AnySession) -> Result<R>,
    ) -> Result<R> {
        self.access(id, Error::StaleCompletion, f).await
    }

    /// End session `id`. Operations still in flight for it are discarded
    /// when they complete.
    pub async fn remove(&self, id: SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .remove(&id)
            .map(|_| info!("Closed session {id}"))
            .ok_or(Error::SessionNotFound(id))
    }

    /// Drop sessions idle since before `now - ttl`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        expire(&mut sessions, now, self.ttl)
    }

    /// Fetch the voter's profile and catalog for a session whose load began
    /// with `generation`, then apply the result.
    pub async fn load(
        &self,
        id: SessionId,
        generation: Generation,
        registry: RegistryLookup<'_>,
    ) -> Result<AnyView> {
        let (national_id, kind) = self
            .with(id, |s| Ok((s.identity().national_id().clone(), s.kind())))
            .await?;
        match kind {
            TrackKind::List => {
                let loaded = VotingSession::<ListTrack>::fetch(registry, &national_id).await;
                self.finish_loading::<ListTrack>(id, generation, loaded).await
            }
            TrackKind::Party => {
                let loaded = VotingSession::<PartyTrack>::fetch(registry, &national_id).await;
                self.finish_loading::<PartyTrack>(id, generation, loaded).await
            }
        }
    }

    async fn finish_loading<T: Track>(
        &self,
        id: SessionId,
        generation: Generation,
        loaded: Result<(Voter, T::Catalog)>,
    ) -> Result<AnyView> {
        self.complete(id, |session| {
            let session = T::narrow(session).ok_or(Error::StaleCompletion)?;
            session.finish_loading(generation, loaded)?;
            Ok(T::wrap_view(session.view()))
        })
        .await
    }
}

fn expire(sessions: &mut HashMap<SessionId, Entry>, now: DateTime<Utc>, ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|id, entry| {
        let live = now - entry.touched_at <= ttl;
        if !live {
            debug!("Session {id} expired");
        }
        live
    });
    before - sessions.len()
}
