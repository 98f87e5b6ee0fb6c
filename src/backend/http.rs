use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Response};
use rocket::serde::json::{serde_json, Value};
use serde::{de::DeserializeOwned, Serialize};

use super::{BackendError, VotingBackend};
use crate::model::{
    catalog::{CityCatalog, Party},
    payload::{ListVote, PartyVote},
    voter::Voter,
};

const VOTERS_PATH: &str = "/api/voting/users";
const CANDIDATES_PATH: &str = "/api/voting/candidates-by-city";
const LIST_VOTE_PATH: &str = "/api/voting/votedcircle";
const PARTIES_PATH: &str = "/parties";
const PARTY_VOTE_PATH: &str = "/votedparty";

/// The external service, reached over JSON/HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.endpoint(path);
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("GET {url} answered {status}");
            return Err(BackendError::Status(status));
        }
        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                BackendError::Malformed(e.to_string())
            } else {
                BackendError::Transport(e)
            }
        })
    }

    async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), BackendError> {
        let url = self.endpoint(path);
        debug!("PATCH {url}");
        let response = self.client.patch(&url).json(body).send().await?;
        accepted(response).await
    }
}

/// Any 2xx status accepts the vote; anything else is a rejection whose
/// reason is the response body.
async fn accepted(response: Response) -> Result<(), BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let reason = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    };
    Err(BackendError::Rejected(reason))
}

/// Decode registry records one at a time. A malformed record is skipped so
/// it cannot hide every other voter.
fn decode_voters(records: Vec<Value>) -> Vec<Voter> {
    let total = records.len();
    let voters: Vec<Voter> = records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(voter) => Some(voter),
            Err(e) => {
                warn!("Skipping malformed registry record: {e}");
                None
            }
        })
        .collect();
    if voters.len() < total {
        warn!("Skipped {} of {total} registry records", total - voters.len());
    }
    voters
}

#[rocket::async_trait]
impl VotingBackend for HttpBackend {
    async fn voters(&self) -> Result<Vec<Voter>, BackendError> {
        let records: Vec<Value> = self.get(VOTERS_PATH).await?;
        Ok(decode_voters(records))
    }

    async fn city_catalog(&self) -> Result<Vec<CityCatalog>, BackendError> {
        self.get(CANDIDATES_PATH).await
    }

    async fn parties(&self) -> Result<Vec<Party>, BackendError> {
        self.get(PARTIES_PATH).await
    }

    async fn submit_list_vote(&self, vote: &ListVote) -> Result<(), BackendError> {
        self.patch(LIST_VOTE_PATH, vote).await
    }

    async fn submit_party_vote(&self, vote: &PartyVote) -> Result<(), BackendError> {
        self.patch(PARTY_VOTE_PATH, vote).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::RegistryLookup, error::Error};

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:4003/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.endpoint(VOTERS_PATH),
            "http://localhost:4003/api/voting/users"
        );
        assert_eq!(backend.endpoint(PARTY_VOTE_PATH), "http://localhost:4003/votedparty");
    }

    #[test]
    fn malformed_records_are_skipped() {
        let records = serde_json::json!([
            {"national_id": "98765", "name": "n", "city": "Sfax", "circle": "B"},
            {"national_id": "", "name": "n", "city": "Sfax", "circle": "B"},
            {"name": "no id"},
            {"national_id": 12345, "name": "n", "city": "Tunis", "circle": "A"},
        ]);
        let records: Vec<Value> = serde_json::from_value(records).unwrap();

        let voters = decode_voters(records);

        let ids: Vec<&str> = voters.iter().map(|v| v.national_id.as_str()).collect();
        assert_eq!(ids, ["98765", "12345"]);
    }

    #[rocket::async_test]
    async fn refused_connection_is_registry_unavailable() {
        // Nothing listens on the discard port.
        let backend = HttpBackend::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let id = "12345".parse().unwrap();
        let verdict = RegistryLookup::new(&backend).exists(&id).await;
        assert!(matches!(verdict, Err(Error::RegistryUnavailable(_))));
    }
}
