//! Open/close tickets per source path
//!
//! Every open and close takes a ticket from one increasing counter. A
//! parse completion with ticket `g` may commit only while no later close
//! of its path was issued and no later open of its path has committed.

use std::collections::HashMap;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct PathTickets {
    last_close: u64,
    last_commit: u64,
}

#[derive(Debug)]
pub(crate) struct GenerationLedger {
    next: u64,
    paths: HashMap<String, PathTickets>,
}

impl GenerationLedger {
    /// Ledger whose first ticket is `first` (at least 1)
    pub(crate) fn starting_at(first: u64) -> Self {
        Self {
            next: first.max(1),
            paths: HashMap::new(),
        }
    }

    /// Ticket for an open request
    pub(crate) fn issue(&mut self) -> u64 {
        let ticket = self.next;
        self.next += 1;
        ticket
    }

    /// Ticket for a close request of `path`, recorded as its latest close
    pub(crate) fn record_close(&mut self, path: &str) -> u64 {
        let ticket = self.issue();
        self.paths.entry(path.to_string()).or_default().last_close = ticket;
        ticket
    }

    pub(crate) fn may_commit(&self, path: &str, ticket: u64) -> bool {
        self.paths
            .get(path)
            .map_or(true, |t| t.last_close < ticket && t.last_commit < ticket)
    }

    pub(crate) fn commit(&mut self, path: &str, ticket: u64) {
        let tickets = self.paths.entry(path.to_string()).or_default();
        tickets.last_commit = tickets.last_commit.max(ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncontested_open_commits() {
        let mut ledger = GenerationLedger::starting_at(1);
        let open = ledger.issue();
        assert!(ledger.may_commit("/a", open));
    }

    #[test]
    fn later_close_discards_earlier_open() {
        let mut ledger = GenerationLedger::starting_at(1);
        let open = ledger.issue();
        ledger.record_close("/a");
        assert!(!ledger.may_commit("/a", open));
        assert!(ledger.may_commit("/b", open));
    }

    #[test]
    fn open_after_close_commits() {
        let mut ledger = GenerationLedger::starting_at(1);
        ledger.record_close("/a");
        let open = ledger.issue();
        assert!(ledger.may_commit("/a", open));
    }

    #[test]
    fn newer_commit_discards_older_open() {
        let mut ledger = GenerationLedger::starting_at(10);
        let first = ledger.issue();
        let second = ledger.issue();
        assert!(ledger.may_commit("/a", second));
        ledger.commit("/a", second);
        assert!(!ledger.may_commit("/a", first));
    }

    #[test]
    fn zero_start_is_bumped() {
        let mut ledger = GenerationLedger::starting_at(0);
        assert_eq!(ledger.issue(), 1);
    }
}
