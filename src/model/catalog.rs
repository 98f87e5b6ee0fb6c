use std::convert::Infallible;
use std::fmt::{Display, Formatter};

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Deserializer, Serialize};

use super::pagination::{Paginated, Pagination};

/// A candidate's national id as the catalog service sends it, either a JSON
/// string or a JSON number. Unlike a voter's id it is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CandidateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for CandidateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(u64),
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Text(id) => Self(id),
            Wire::Number(id) => Self(id.to_string()),
        })
    }
}

impl<'a> FromParam<'a> for CandidateId {
    type Error = Infallible;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        Ok(Self::from(param))
    }
}

impl UriDisplay<Path> for CandidateId {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] CandidateId);

/// A candidate standing on one list in one circle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_national_id: CandidateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A named slate of candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    pub list: String,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl CandidateList {
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|c| c.candidate_national_id.as_str() == candidate_id)
    }
}

/// One circle of a city, as served by `/api/voting/candidates-by-city`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircleCatalog {
    pub circle: String,
    #[serde(default)]
    pub lists: Vec<CandidateList>,
}

/// One city entry, as served by `/api/voting/candidates-by-city`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityCatalog {
    pub city: String,
    #[serde(default)]
    pub circles: Vec<CircleCatalog>,
}

/// The candidate lists contesting a single (city, circle), in service order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListCatalog {
    pub city: String,
    pub circle: String,
    pub lists: Vec<CandidateList>,
}

impl ListCatalog {
    /// Narrow the full catalog down to one city and circle. Repeated entries
    /// for the same city or circle are concatenated in order.
    pub fn scoped(all: Vec<CityCatalog>, city: &str, circle: &str) -> Self {
        let lists = all
            .into_iter()
            .filter(|entry| entry.city == city)
            .flat_map(|entry| entry.circles)
            .filter(|entry| entry.circle == circle)
            .flat_map(|entry| entry.lists)
            .collect();

        Self {
            city: city.to_string(),
            circle: circle.to_string(),
            lists,
        }
    }

    pub fn list(&self, name: &str) -> Option<&CandidateList> {
        self.lists.iter().find(|l| l.list == name)
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

/// A party on the national ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub party: String,
}

/// All parties on the national ballot, in service order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PartyCatalog {
    parties: Vec<Party>,
}

impl PartyCatalog {
    pub fn new(parties: Vec<Party>) -> Self {
        Self { parties }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parties.iter().any(|p| p.party == name)
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    /// One page of parties, for display.
    pub fn page(&self, pagination: &Pagination) -> Paginated<Party> {
        let items = self
            .parties
            .iter()
            .skip(pagination.skip())
            .take(pagination.page_size())
            .cloned()
            .collect();
        pagination.paginate(self.parties.len(), items)
    }
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn scoped_catalog_keeps_only_voter_circle() {
        let catalog = ListCatalog::scoped(CityCatalog::example(), "Tunis", "A");
        let names = catalog.lists.iter().map(|l| l.list.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["L1", "L2"]);
        assert!(catalog.list("L5").is_none());
        assert!(catalog.list("L9").is_none());
    }

    #[test]
    fn scoped_catalog_for_unknown_circle_is_empty() {
        let catalog = ListCatalog::scoped(CityCatalog::example(), "Tunis", "Z");
        assert!(catalog.is_empty());
    }

    #[test]
    fn repeated_city_entries_are_merged() {
        let mut all = CityCatalog::example();
        all.push(CityCatalog {
            city: "Tunis".to_string(),
            circles: vec![CircleCatalog {
                circle: "A".to_string(),
                lists: vec![CandidateList {
                    list: "L3".to_string(),
                    candidates: vec![],
                }],
            }],
        });
        let catalog = ListCatalog::scoped(all, "Tunis", "A");
        assert_eq!(catalog.lists.len(), 3);
        assert_eq!(catalog.lists[2].list, "L3");
    }

    #[test]
    fn catalog_decodes_service_shape() {
        let json = r#"[{"city": "Tunis", "circles": [{"circle": "A", "lists": [
            {"list": "L1", "candidates": [
                {"candidate_national_id": 1, "name": "c1", "description": "engineer"},
                {"candidate_national_id": "2", "name": "c2"}
            ]}
        ]}]}]"#;
        let all: Vec<CityCatalog> = serde_json::from_str(json).unwrap();
        let catalog = ListCatalog::scoped(all, "Tunis", "A");
        let list = catalog.list("L1").unwrap();
        assert_eq!(list.candidate("1").unwrap().description, "engineer");
        assert_eq!(list.candidate("2").unwrap().description, "");
    }

    #[test]
    fn party_pages() {
        let catalog = PartyCatalog::new(Party::example_list(8));
        let second = catalog.page(&Pagination::new(2, 6).unwrap());
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[0].party, "P7");
        assert_eq!(second.pagination.total, 8);
        assert_eq!(second.pagination.page_count, 2);

        let beyond = catalog.page(&Pagination::new(3, 6).unwrap());
        assert!(beyond.items.is_empty());
    }
}
