//! Persisted registry records.
//!
//! Two document shapes live in the store:
//! - [`HandleRecord`] in the handle index, keyed by the handle string
//! - [`OwnerRecord`] in the owner collection, keyed by [`OwnerId`]
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::handle::Handle;
use crate::identity::OwnerId;
use crate::temporal::Timestamp;

/// Uniqueness-index entry: the existence of this record *is* the reservation
/// of its handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleRecord {
    /// Current holder of the handle.
    pub owner_id: OwnerId,
    /// When the record was written.
    pub created_at: Timestamp,
    /// `true` if the handle was machine-generated.
    pub is_generated: bool,
}

/// One period of handle ownership.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleHistoryEntry {
    pub handle: Handle,
    pub used_from: Timestamp,
    /// `None` while the handle is still held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_until: Option<Timestamp>,
}

impl HandleHistoryEntry {
    /// A new open entry starting at `from`.
    pub fn open(handle: Handle, from: Timestamp) -> Self {
        Self {
            handle,
            used_from: from,
            used_until: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.used_until.is_none()
    }
}

/// The registry-owned part of an owner document.
///
/// Owners created before handles were mandatory have no handle at all; they
/// are `Unprovisioned` rather than carrying an empty optional field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Owner {
    Provisioned {
        handle: Handle,
        history: Vec<HandleHistoryEntry>,
    },
    Unprovisioned,
}

impl Owner {
    /// A freshly provisioned owner holding `handle` since `now`.
    pub fn provisioned(handle: Handle, now: Timestamp) -> Self {
        Self::Provisioned {
            history: vec![HandleHistoryEntry::open(handle.clone(), now)],
            handle,
        }
    }

    /// The current handle, if any.
    pub fn handle(&self) -> Option<&Handle> {
        match self {
            Self::Provisioned { handle, .. } => Some(handle),
            Self::Unprovisioned => None,
        }
    }

    /// Ownership history, oldest first. Empty for unprovisioned owners.
    pub fn history(&self) -> &[HandleHistoryEntry] {
        match self {
            Self::Provisioned { history, .. } => history,
            Self::Unprovisioned => &[],
        }
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self, Self::Provisioned { .. })
    }

    /// The identity after switching to `new_handle` at `now`.
    ///
    /// The last history entry (if any) is closed at `now` and a new open
    /// entry is appended. Earlier entries are carried over untouched.
    ///
    /// `now` is clamped to the last entry's `used_from`, so a wall clock that
    /// stepped backwards cannot produce an entry that ends before it starts.
    pub fn with_handle(&self, new_handle: Handle, now: Timestamp) -> Self {
        let mut history = self.history().to_vec();
        let now = match history.last() {
            Some(last) if last.used_from.is_after(&now) => last.used_from,
            _ => now,
        };
        if let Some(last) = history.last_mut() {
            last.used_until = Some(now);
        }
        history.push(HandleHistoryEntry::open(new_handle.clone(), now));
        Self::Provisioned {
            handle: new_handle,
            history,
        }
    }

    /// Check the history invariants:
    /// - exactly one open entry, and it is the last one
    /// - the last entry's handle equals the current handle
    /// - every closed entry ends no earlier than it starts
    /// - every closed entry ends no later than its successor starts
    pub fn check_history(&self) -> Result<(), TypeError> {
        let Self::Provisioned { handle, history } = self else {
            return Ok(());
        };

        let Some(last) = history.last() else {
            return Err(TypeError::InconsistentHistory(
                "provisioned owner has empty history".into(),
            ));
        };
        if &last.handle != handle {
            return Err(TypeError::InconsistentHistory(format!(
                "last entry {} does not match current handle {handle}",
                last.handle
            )));
        }
        if !last.is_active() {
            return Err(TypeError::InconsistentHistory(
                "current handle entry is closed".into(),
            ));
        }

        for entry in history {
            if let Some(until) = entry.used_until {
                if entry.used_from.is_after(&until) {
                    return Err(TypeError::InconsistentHistory(format!(
                        "entry {} ends before it starts",
                        entry.handle
                    )));
                }
            }
        }

        for pair in history.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            match prev.used_until {
                None => {
                    return Err(TypeError::InconsistentHistory(format!(
                        "entry {} is open but not last",
                        prev.handle
                    )));
                }
                Some(until) if until.is_after(&next.used_from) => {
                    return Err(TypeError::InconsistentHistory(format!(
                        "entry {} overlaps its successor {}",
                        prev.handle, next.handle
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// An owner document as stored in the owner collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRecord {
    pub id: OwnerId,
    pub created_at: Timestamp,
    pub identity: Owner,
}

impl OwnerRecord {
    /// An owner with no handle yet.
    pub fn unprovisioned(id: OwnerId, created_at: Timestamp) -> Self {
        Self {
            id,
            created_at,
            identity: Owner::Unprovisioned,
        }
    }

    pub fn handle(&self) -> Option<&Handle> {
        self.identity.handle()
    }

    pub fn history(&self) -> &[HandleHistoryEntry] {
        self.identity.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> Handle {
        Handle::parse(s).unwrap()
    }

    fn ts(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn provisioned_owner_has_single_open_entry() {
        let owner = Owner::provisioned(h("alice"), ts(10));
        assert_eq!(owner.handle(), Some(&h("alice")));
        assert_eq!(owner.history().len(), 1);
        assert!(owner.history()[0].is_active());
        owner.check_history().unwrap();
    }

    #[test]
    fn with_handle_closes_previous_entry() {
        let owner = Owner::provisioned(h("alice"), ts(10)).with_handle(h("alicia"), ts(20));
        let history = owner.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].handle, h("alice"));
        assert_eq!(history[0].used_until, Some(ts(20)));
        assert_eq!(history[1].handle, h("alicia"));
        assert_eq!(history[1].used_from, ts(20));
        assert!(history[1].is_active());
        owner.check_history().unwrap();
    }

    #[test]
    fn with_handle_on_unprovisioned_starts_history() {
        let owner = Owner::Unprovisioned.with_handle(h("newbie"), ts(5));
        assert_eq!(owner.history().len(), 1);
        assert_eq!(owner.handle(), Some(&h("newbie")));
        owner.check_history().unwrap();
    }

    #[test]
    fn check_history_rejects_mismatched_handle() {
        let owner = Owner::Provisioned {
            handle: h("bob"),
            history: vec![HandleHistoryEntry::open(h("alice"), ts(1))],
        };
        assert!(matches!(
            owner.check_history(),
            Err(TypeError::InconsistentHistory(_))
        ));
    }

    #[test]
    fn check_history_rejects_two_open_entries() {
        let owner = Owner::Provisioned {
            handle: h("bob"),
            history: vec![
                HandleHistoryEntry::open(h("alice"), ts(1)),
                HandleHistoryEntry::open(h("bob"), ts(2)),
            ],
        };
        assert!(owner.check_history().is_err());
    }

    #[test]
    fn check_history_rejects_overlap() {
        let owner = Owner::Provisioned {
            handle: h("bob"),
            history: vec![
                HandleHistoryEntry {
                    handle: h("alice"),
                    used_from: ts(1),
                    used_until: Some(ts(9)),
                },
                HandleHistoryEntry::open(h("bob"), ts(5)),
            ],
        };
        assert!(owner.check_history().is_err());
    }

    #[test]
    fn check_history_rejects_entry_ending_before_it_starts() {
        let owner = Owner::Provisioned {
            handle: h("bob"),
            history: vec![
                HandleHistoryEntry {
                    handle: h("alice"),
                    used_from: ts(50),
                    used_until: Some(ts(40)),
                },
                HandleHistoryEntry::open(h("bob"), ts(60)),
            ],
        };
        assert!(matches!(
            owner.check_history(),
            Err(TypeError::InconsistentHistory(_))
        ));
    }

    #[test]
    fn with_handle_clamps_clock_that_stepped_back() {
        let owner = Owner::provisioned(h("alice"), ts(100)).with_handle(h("alicia"), ts(40));
        let history = owner.history();
        assert_eq!(history[0].used_until, Some(ts(100)));
        assert_eq!(history[1].used_from, ts(100));
        owner.check_history().unwrap();
    }

    #[test]
    fn wire_format_is_camel_case() {
        let record = HandleRecord {
            owner_id: OwnerId::new(),
            created_at: ts(7),
            is_generated: true,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["createdAt"], 7);
        assert_eq!(json["isGenerated"], true);
        assert!(json.get("ownerId").is_some());
    }

    #[test]
    fn owner_status_tag() {
        let record = OwnerRecord::unprovisioned(OwnerId::new(), ts(1));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["identity"]["status"], "unprovisioned");

        let record = OwnerRecord {
            identity: Owner::provisioned(h("alice"), ts(3)),
            ..record
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["identity"]["status"], "provisioned");
        assert_eq!(json["identity"]["handle"], "alice");
        assert_eq!(json["identity"]["history"][0]["usedFrom"], 3);
        assert!(json["identity"]["history"][0].get("usedUntil").is_none());

        let back: OwnerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
