use serde::Serialize;

use super::catalog::Candidate;

/// What a ballot currently says. Blank and concrete picks exclude each other
/// by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "pick", rename_all = "snake_case")]
pub enum Choice<P> {
    /// Nothing chosen yet.
    Undecided,
    /// An explicit blank ballot.
    Blank,
    /// A concrete pick for the track.
    Concrete(P),
}

impl<P> Default for Choice<P> {
    fn default() -> Self {
        Self::Undecided
    }
}

impl<P> Choice<P> {
    /// Setting blank discards any concrete pick. Clearing blank leaves the
    /// ballot undecided; earlier picks are not restored.
    pub fn set_blank(&mut self, blank: bool) {
        if blank {
            *self = Self::Blank;
        } else if self.is_blank() {
            *self = Self::Undecided;
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Blank)
    }

    pub fn concrete(&self) -> Option<&P> {
        match self {
            Self::Concrete(pick) => Some(pick),
            _ => None,
        }
    }

    pub fn concrete_mut(&mut self) -> Option<&mut P> {
        match self {
            Self::Concrete(pick) => Some(pick),
            _ => None,
        }
    }
}

/// A pick on the circle ballot: one list plus any of its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListPick {
    list: String,
    /// Unique by national id, in the order they were picked.
    candidates: Vec<Candidate>,
}

impl ListPick {
    pub fn new(list: impl Into<String>) -> Self {
        Self {
            list: list.into(),
            candidates: Vec::new(),
        }
    }

    pub fn list(&self) -> &str {
        &self.list
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Add the candidate if absent, remove it if present.
    /// Returns whether the candidate is now picked.
    pub fn toggle(&mut self, candidate: &Candidate) -> bool {
        let position = self
            .candidates
            .iter()
            .position(|c| c.candidate_national_id == candidate.candidate_national_id);
        match position {
            Some(index) => {
                self.candidates.remove(index);
                false
            }
            None => {
                self.candidates.push(candidate.clone());
                true
            }
        }
    }

    pub fn candidate_ids(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| c.candidate_national_id.to_string())
            .collect()
    }
}
