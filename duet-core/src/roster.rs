//! Roster: latest snapshot of participants known to the hub.

use crate::ids::ParticipantId;
use crate::protocol::RosterEntry;

/// Ordered roster snapshot. Each update replaces the previous one.
#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot. Later duplicates of a participant override earlier rows.
    pub fn apply(&mut self, entries: Vec<RosterEntry>) {
        let mut out: Vec<RosterEntry> = Vec::with_capacity(entries.len());
        for e in entries {
            match out.iter_mut().find(|x| x.participant == e.participant) {
                Some(existing) => existing.present = e.present,
                None => out.push(e),
            }
        }
        self.entries = out;
    }

    /// Present participants other than `me`, in relay order.
    pub fn reachable<'a>(&'a self, me: &'a ParticipantId) -> impl Iterator<Item = &'a ParticipantId> {
        self.entries
            .iter()
            .filter(move |e| e.present && e.participant != *me)
            .map(|e| &e.participant)
    }

    pub fn is_reachable(&self, id: &ParticipantId) -> bool {
        self.entries.iter().any(|e| e.present && e.participant == *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
