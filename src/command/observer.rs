use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::CommandSnapshot;

/// Points in the history lifecycle a callback can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ObserverSlot {
    Execute,
    Undo,
    Redo,
    HistoryChange,
    SavePoint,
}

/// Counts and flags a UI needs to drive undo/redo controls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub undo_count: usize,
    pub redo_count: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub is_dirty: bool,
    pub last_command: Option<CommandSnapshot>,
}

/// Payload delivered to observer callbacks
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryNotification {
    pub slot: ObserverSlot,
    pub history: HistorySnapshot,
    /// The command that triggered the transition, if any
    pub command: Option<CommandSnapshot>,
}

pub type ObserverResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub type HistoryCallback = Arc<dyn Fn(&HistoryNotification) -> ObserverResult + Send + Sync>;

/// One callback per slot, invoked synchronously
#[derive(Default)]
pub(crate) struct Observers {
    callbacks: RwLock<HashMap<ObserverSlot, HistoryCallback>>,
}

impl Observers {
    pub fn set(&self, slot: ObserverSlot, callback: HistoryCallback) {
        self.callbacks.write().insert(slot, callback);
    }

    pub fn clear(&self, slot: ObserverSlot) -> bool {
        self.callbacks.write().remove(&slot).is_some()
    }

    pub fn notify(&self, notification: &HistoryNotification) {
        // Release the lock before calling out so callbacks may register others
        let callback = self.callbacks.read().get(&notification.slot).cloned();
        if let Some(callback) = callback {
            if let Err(err) = callback(notification) {
                log::error!("{:?} observer failed: {}", notification.slot, err);
            }
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<ObserverSlot> = self.callbacks.read().keys().copied().collect();
        f.debug_struct("Observers").field("slots", &slots).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty_history() -> HistorySnapshot {
        HistorySnapshot {
            undo_count: 0,
            redo_count: 0,
            can_undo: false,
            can_redo: false,
            is_dirty: false,
            last_command: None,
        }
    }

    #[test]
    fn test_notify_routes_by_slot() {
        let observers = Observers::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        observers.set(
            ObserverSlot::Undo,
            Arc::new(move |_: &HistoryNotification| -> ObserverResult {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        let mut notification = HistoryNotification {
            slot: ObserverSlot::Execute,
            history: empty_history(),
            command: None,
        };
        observers.notify(&notification);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        notification.slot = ObserverSlot::Undo;
        observers.notify(&notification);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(observers.clear(ObserverSlot::Undo));
        observers.notify(&notification);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_callback_is_contained() {
        let observers = Observers::default();
        observers.set(
            ObserverSlot::SavePoint,
            Arc::new(|_: &HistoryNotification| -> ObserverResult { Err("disk full".into()) }),
        );
        observers.notify(&HistoryNotification {
            slot: ObserverSlot::SavePoint,
            history: empty_history(),
            command: None,
        });
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let value = serde_json::to_value(empty_history()).unwrap();
        assert_eq!(value["undoCount"], 0);
        assert_eq!(value["isDirty"], false);
        assert!(value["lastCommand"].is_null());
    }
}
