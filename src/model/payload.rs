use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::{
    selection::{Choice, ListPick},
    voter::Voter,
};

/// Client-generated identifier attached to every transmission from one
/// voting session, so the voting-record service can discard duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(#[serde(with = "hex_u128")] u128);

impl SubmissionId {
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl Display for SubmissionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

mod hex_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{value:032x}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        u128::from_str_radix(&s, 16).map_err(serde::de::Error::custom)
    }
}

/// Body of `PATCH /api/voting/votedcircle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVote {
    pub user: Voter,
    pub candidate: ListBallot,
    pub submission_id: SubmissionId,
}

/// The circle ballot itself. A blank ballot has no candidates and an empty list name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBallot {
    pub candidate_national_ids: Vec<String>,
    pub circle_list: String,
    pub city: String,
    pub circle: String,
}

impl ListVote {
    pub fn new(voter: &Voter, choice: &Choice<ListPick>, submission_id: SubmissionId) -> Self {
        let (candidate_national_ids, circle_list) = match choice.concrete() {
            Some(pick) => (pick.candidate_ids(), pick.list().to_string()),
            None => (Vec::new(), String::new()),
        };

        Self {
            user: voter.clone(),
            candidate: ListBallot {
                candidate_national_ids,
                circle_list,
                city: voter.city.clone(),
                circle: voter.circle.clone(),
            },
            submission_id,
        }
    }
}

/// Body of `PATCH /votedparty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyVote {
    pub user: Voter,
    pub candidate: PartyBallot,
    pub submission_id: SubmissionId,
}

/// The party ballot itself. A blank ballot carries no party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyBallot {
    pub party: Option<String>,
    #[serde(rename = "whitePaper")]
    pub white_paper: bool,
}

impl PartyVote {
    pub fn new(voter: &Voter, choice: &Choice<String>, submission_id: SubmissionId) -> Self {
        Self {
            user: voter.clone(),
            candidate: PartyBallot {
                party: choice.concrete().cloned(),
                white_paper: choice.is_blank(),
            },
            submission_id,
        }
    }
}

/// A finalized vote, frozen at confirmation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VotePayload {
    List(ListVote),
    Party(PartyVote),
}

impl VotePayload {
    pub fn submission_id(&self) -> SubmissionId {
        match self {
            Self::List(vote) => vote.submission_id,
            Self::Party(vote) => vote.submission_id,
        }
    }
}
