use std::fmt::{Display, Formatter};
use std::num::ParseIntError;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// Proof that the voter was shown the confirmation prompt. Redeemable once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationTicket(u64);

impl Display for ConfirmationTicket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'a> FromParam<'a> for ConfirmationTicket {
    type Error = ParseIntError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse().map(Self)
    }
}

impl UriDisplay<Path> for ConfirmationTicket {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.0)
    }
}

impl_from_uri_param_identity!([Path] ConfirmationTicket);

/// A single prompt slot. Opening a prompt replaces any earlier ticket, and
/// tickets are never reissued, so an old or repeated confirm cannot pass.
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    issued: u64,
    open: Option<ConfirmationTicket>,
}

impl ConfirmationGate {
    pub fn open(&mut self) -> ConfirmationTicket {
        self.issued += 1;
        let ticket = ConfirmationTicket(self.issued);
        self.open = Some(ticket);
        ticket
    }

    /// Withdraw the prompt. Returns whether one was open.
    pub fn close(&mut self) -> bool {
        self.open.take().is_some()
    }

    /// Consume the open ticket if it is `ticket`.
    pub fn redeem(&mut self, ticket: ConfirmationTicket) -> bool {
        if self.open == Some(ticket) {
            self.open = None;
            true
        } else {
            false
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_redeems_once() {
        let mut gate = ConfirmationGate::default();
        let ticket = gate.open();
        assert!(gate.redeem(ticket));
        assert!(!gate.redeem(ticket));
        assert!(!gate.is_open());
    }

    #[test]
    fn reopening_invalidates_old_ticket() {
        let mut gate = ConfirmationGate::default();
        let first = gate.open();
        let second = gate.open();
        assert!(first < second);
        assert!(!gate.redeem(first));
        assert!(gate.redeem(second));
    }

    #[test]
    fn closed_gate_redeems_nothing() {
        let mut gate = ConfirmationGate::default();
        let ticket = gate.open();
        assert!(gate.close());
        assert!(!gate.close());
        assert!(!gate.redeem(ticket));
    }
}
