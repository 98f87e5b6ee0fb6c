use rocket::{http::Status, serde::json::Json, Data, Route, State};
use serde::{Deserialize, Serialize};

use crate::{
    backend::{RegistryLookup, SharedBackend},
    config::Config,
    error::{Error, Result},
    identity::{
        extract::NationalIdExtractor,
        ocr::{ProgressReporter, SharedOcr},
        IdentityOutcome, IdentityPipeline,
    },
    model::{catalog::CandidateId, voter::IdentityContext},
    session::{
        gate::ConfirmationTicket,
        store::{AnyView, SessionId, SessionStore},
        submit::VoteSubmitter,
        ListTrack, PartyTrack, Track, VotingSession,
    },
};

use super::read_image;

pub fn routes() -> Vec<Route> {
    routes![
        open_list,
        open_party,
        get_session,
        reload,
        check_identity,
        select_list,
        toggle_candidate,
        select_party,
        set_blank,
        request_confirmation,
        cancel_confirmation,
        confirm,
        acknowledge,
        close,
    ]
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ListChoice {
    pub list: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PartyChoice {
    pub party: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BlankChoice {
    pub blank: bool,
}

/// The confirmation prompt: the ticket to confirm with, and the ballot as it
/// will be sent.
#[derive(Serialize)]
pub struct ConfirmationPrompt {
    pub ticket: ConfirmationTicket,
    pub session: AnyView,
}

/// Open a session on track `T` for the identified voter and load its data.
async fn open<T: Track>(
    identity: IdentityContext,
    sessions: &SessionStore,
    backend: &SharedBackend,
) -> Result<Json<AnyView>> {
    let mut session = VotingSession::<T>::new(identity);
    let generation = session.begin_loading()?;
    let id = sessions.insert(T::wrap(session)).await;
    let view = sessions
        .load(id, generation, RegistryLookup::new(&**backend))
        .await?;
    Ok(Json(view))
}

#[post("/sessions/list")]
pub async fn open_list(
    identity: std::result::Result<IdentityContext, Error>,
    sessions: &State<SessionStore>,
    backend: &State<SharedBackend>,
) -> Result<Json<AnyView>> {
    open::<ListTrack>(identity?, sessions, backend).await
}

#[post("/sessions/party")]
pub async fn open_party(
    identity: std::result::Result<IdentityContext, Error>,
    sessions: &State<SessionStore>,
    backend: &State<SharedBackend>,
) -> Result<Json<AnyView>> {
    open::<PartyTrack>(identity?, sessions, backend).await
}

#[get("/sessions/<id>")]
pub async fn get_session(id: SessionId, sessions: &State<SessionStore>) -> Result<Json<AnyView>> {
    sessions.with(id, |s| Ok(Json(s.view()))).await
}

/// Retry loading a blocked session.
#[post("/sessions/<id>/reload")]
pub async fn reload(
    id: SessionId,
    sessions: &State<SessionStore>,
    backend: &State<SharedBackend>,
) -> Result<Json<AnyView>> {
    let generation = sessions.with(id, |s| s.begin_loading()).await?;
    let view = sessions
        .load(id, generation, RegistryLookup::new(&***backend))
        .await?;
    Ok(Json(view))
}

/// Run an id card check inside a session. Only the most recent upload may
/// set the session's verdict.
#[post("/sessions/<id>/identity", data = "<image>")]
pub async fn check_identity(
    id: SessionId,
    image: Data<'_>,
    sessions: &State<SessionStore>,
    config: &State<Config>,
    ocr: &State<SharedOcr>,
    backend: &State<SharedBackend>,
    extractor: &State<NationalIdExtractor>,
) -> Result<Json<IdentityOutcome>> {
    let stamp = sessions
        .with(id, |s| Ok(s.identity_check_mut().begin_upload()))
        .await?;
    let image = read_image(image, config).await?;
    let pipeline = IdentityPipeline::new(
        &**ocr.inner(),
        extractor,
        &**backend.inner(),
        config.ocr_language(),
    );
    let result = pipeline.run(&image, &ProgressReporter::logging()).await;
    let outcome = sessions
        .complete(id, |s| s.identity_check_mut().resolve(stamp, result))
        .await?;
    Ok(Json(outcome))
}

#[put("/sessions/<id>/list", data = "<choice>", format = "json")]
pub async fn select_list(
    id: SessionId,
    choice: Json<ListChoice>,
    sessions: &State<SessionStore>,
) -> Result<Json<AnyView>> {
    sessions
        .with_track::<ListTrack, _>(id, |s| {
            s.select_list(&choice.list)?;
            Ok(Json(AnyView::List(s.view())))
        })
        .await
}

#[post("/sessions/<id>/candidates/<candidate_id>")]
pub async fn toggle_candidate(
    id: SessionId,
    candidate_id: CandidateId,
    sessions: &State<SessionStore>,
) -> Result<Json<AnyView>> {
    sessions
        .with_track::<ListTrack, _>(id, |s| {
            s.toggle_candidate(candidate_id.as_str())?;
            Ok(Json(AnyView::List(s.view())))
        })
        .await
}

#[put("/sessions/<id>/party", data = "<choice>", format = "json")]
pub async fn select_party(
    id: SessionId,
    choice: Json<PartyChoice>,
    sessions: &State<SessionStore>,
) -> Result<Json<AnyView>> {
    sessions
        .with_track::<PartyTrack, _>(id, |s| {
            s.select_party(&choice.party)?;
            Ok(Json(AnyView::Party(s.view())))
        })
        .await
}

#[put("/sessions/<id>/blank", data = "<choice>", format = "json")]
pub async fn set_blank(
    id: SessionId,
    choice: Json<BlankChoice>,
    sessions: &State<SessionStore>,
) -> Result<Json<AnyView>> {
    sessions
        .with(id, |s| {
            s.set_blank(choice.blank)?;
            Ok(Json(s.view()))
        })
        .await
}

#[post("/sessions/<id>/confirmation")]
pub async fn request_confirmation(
    id: SessionId,
    sessions: &State<SessionStore>,
) -> Result<Json<ConfirmationPrompt>> {
    sessions
        .with(id, |s| {
            let ticket = s.request_confirmation()?;
            Ok(Json(ConfirmationPrompt {
                ticket,
                session: s.view(),
            }))
        })
        .await
}

#[delete("/sessions/<id>/confirmation")]
pub async fn cancel_confirmation(
    id: SessionId,
    sessions: &State<SessionStore>,
) -> Result<Json<AnyView>> {
    sessions
        .with(id, |s| {
            s.cancel_confirmation()?;
            Ok(Json(s.view()))
        })
        .await
}

/// Pass the confirmation gate and transmit the ballot. A rejected vote is
/// not an error of this request: the session moves to `Failure` and the
/// returned view carries the message.
#[post("/sessions/<id>/confirmation/<ticket>")]
pub async fn confirm(
    id: SessionId,
    ticket: ConfirmationTicket,
    sessions: &State<SessionStore>,
    backend: &State<SharedBackend>,
) -> Result<Json<AnyView>> {
    let (generation, payload) = sessions.with(id, |s| s.confirm(ticket)).await?;
    let outcome = VoteSubmitter::new(&**backend.inner())
        .submit(&payload)
        .await;
    sessions
        .complete(id, |s| {
            s.complete_submission(generation, outcome)?;
            Ok(Json(s.view()))
        })
        .await
}

#[post("/sessions/<id>/acknowledge")]
pub async fn acknowledge(id: SessionId, sessions: &State<SessionStore>) -> Result<Json<AnyView>> {
    sessions
        .with(id, |s| {
            s.acknowledge()?;
            Ok(Json(s.view()))
        })
        .await
}

#[delete("/sessions/<id>")]
pub async fn close(id: SessionId, sessions: &State<SessionStore>) -> Result<Status> {
    sessions.remove(id).await?;
    Ok(Status::NoContent)
}
