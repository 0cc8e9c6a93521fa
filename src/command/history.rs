use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use super::observer::Observers;
use super::{
    Command, CommandError, CommandSnapshot, GroupCommand, HistoryNotification, HistorySnapshot,
    ObserverResult, ObserverSlot,
};
use crate::config::HistoryConfig;
use crate::scene::Scene;

/// Why a history operation did not happen
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("History is busy with another operation")]
    Busy,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("No transaction is open")]
    NoTransaction,

    #[error("Transaction '{0}' is already open")]
    TransactionAlreadyOpen(String),

    #[error("Transaction '{0}' is open")]
    TransactionOpen(String),

    #[error("'{description}' failed: {source}")]
    CommandFailed {
        description: String,
        #[source]
        source: CommandError,
    },
}

impl HistoryError {
    fn failed(command: &dyn Command, source: CommandError) -> Self {
        log::error!("'{}' failed: {}", command.description(), source);
        HistoryError::CommandFailed {
            description: command.description().to_string(),
            source,
        }
    }
}

/// Result type for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

fn rejected<T>(err: HistoryError) -> HistoryResult<T> {
    log::warn!("History call rejected: {}", err);
    Err(err)
}

/// Clears the executing flag when an operation finishes, however it exits
struct ExecutionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExecutionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct HistoryState {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    transaction: Option<GroupCommand>,
    /// Undo length at the last save, `None` once that state is unreachable
    save_point: Option<usize>,
    config: HistoryConfig,
}

impl HistoryState {
    fn is_dirty(&self) -> bool {
        self.save_point != Some(self.undo_stack.len())
    }

    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            can_undo: !self.undo_stack.is_empty(),
            can_redo: !self.redo_stack.is_empty(),
            is_dirty: self.is_dirty(),
            last_command: self.undo_stack.back().map(|command| command.snapshot()),
        }
    }

    fn ensure_no_transaction(&self) -> HistoryResult<()> {
        match &self.transaction {
            Some(transaction) => rejected(HistoryError::TransactionOpen(
                transaction.description().to_string(),
            )),
            None => Ok(()),
        }
    }

    /// Drops the oldest entries beyond capacity, returning how many went
    fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.undo_stack.len() > self.config.max_history {
            self.undo_stack.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            self.save_point = self.save_point.map(|index| index.saturating_sub(evicted));
            log::debug!("Evicted {} oldest history entries", evicted);
        }
        evicted
    }

    /// Pops the top entry if `command` may be folded into it.
    ///
    /// The entry recorded at the save point is never merged, otherwise the
    /// saved state would silently change underneath it.
    fn take_merge_partner(&mut self, command: &dyn Command) -> Option<Box<dyn Command>> {
        if !self.config.merge_enabled || self.save_point == Some(self.undo_stack.len()) {
            return None;
        }
        let window = self.config.merge_window();
        let top = self.undo_stack.back()?;
        if top.can_merge_with(command, window) {
            self.undo_stack.pop_back()
        } else {
            None
        }
    }

    /// Pushes a freshly executed entry, invalidating redo
    fn push_executed(&mut self, command: Box<dyn Command>) {
        if !self.redo_stack.is_empty() {
            if self.save_point.is_some_and(|index| index > self.undo_stack.len()) {
                // The saved state lived on the redo branch being discarded
                self.save_point = None;
            }
            log::debug!("Discarding {} redo entries", self.redo_stack.len());
            self.redo_stack.clear();
        }
        self.undo_stack.push_back(command);
        self.trim();
    }
}

/// Linear undo/redo history over a [`Scene`].
///
/// All methods take `&self`: the stacks sit behind a mutex that is released
/// while commands and observer callbacks run, and an executing flag rejects
/// re-entrant mutating calls with [`HistoryError::Busy`]. Read-only queries
/// are always answered, including from inside callbacks.
pub struct CommandManager {
    state: Mutex<HistoryState>,
    executing: AtomicBool,
    observers: Observers,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl CommandManager {
    pub fn new(mut config: HistoryConfig) -> Self {
        config.max_history = config.max_history.max(1);
        Self {
            state: Mutex::new(HistoryState {
                undo_stack: VecDeque::new(),
                redo_stack: Vec::new(),
                transaction: None,
                save_point: Some(0),
                config,
            }),
            executing: AtomicBool::new(false),
            observers: Observers::default(),
        }
    }

    fn guard(&self) -> HistoryResult<ExecutionGuard<'_>> {
        match ExecutionGuard::acquire(&self.executing) {
            Some(guard) => Ok(guard),
            None => rejected(HistoryError::Busy),
        }
    }

    fn notify(&self, slot: ObserverSlot, history: &HistorySnapshot, command: Option<&CommandSnapshot>) {
        self.observers.notify(&HistoryNotification {
            slot,
            history: history.clone(),
            command: command.cloned(),
        });
    }

    /// Execute `command` and record it, merging into the previous entry when allowed
    pub fn execute(&self, command: Box<dyn Command>, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        self.record(command, scene, true)
    }

    /// Execute `command` as its own entry, never merging
    pub fn execute_unmerged(&self, command: Box<dyn Command>, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        self.record(command, scene, false)
    }

    /// Execute several commands as one entry
    pub fn execute_group(
        &self,
        commands: Vec<Box<dyn Command>>,
        description: impl Into<String>,
        scene: &mut dyn Scene,
    ) -> HistoryResult<()> {
        let _guard = self.guard()?;
        let group = GroupCommand::from_commands(description, commands);
        if group.is_empty() {
            log::debug!("Skipping empty group '{}'", group.description());
            return Ok(());
        }
        self.record(Box::new(group), scene, false)
    }

    fn record(&self, command: Box<dyn Command>, scene: &mut dyn Scene, allow_merge: bool) -> HistoryResult<()> {
        let partner = {
            let mut state = self.state.lock();
            if let Some(transaction) = state.transaction.as_mut() {
                log::debug!(
                    "Queued '{}' in transaction '{}'",
                    command.description(),
                    transaction.description()
                );
                transaction.add(command);
                return Ok(());
            }
            if allow_merge {
                state.take_merge_partner(command.as_ref())
            } else {
                None
            }
        };

        let (mut pending, partner) = match partner {
            Some(previous) => match previous.merge_with(command.as_ref()) {
                Some(merged) => {
                    log::debug!("Merging '{}' into '{}'", command.description(), previous.description());
                    (merged, Some(previous))
                }
                None => {
                    self.state.lock().undo_stack.push_back(previous);
                    (command, None)
                }
            },
            None => (command, None),
        };

        if let Err(err) = pending.execute(scene) {
            if let Some(previous) = partner {
                self.state.lock().undo_stack.push_back(previous);
            }
            return Err(HistoryError::failed(pending.as_ref(), err));
        }
        pending.meta_mut().has_run = true;

        let snapshot = pending.snapshot();
        log::debug!("Executed {}", snapshot.to_json());
        let history = {
            let mut state = self.state.lock();
            state.push_executed(pending);
            state.snapshot()
        };
        self.notify(ObserverSlot::Execute, &history, Some(&snapshot));
        self.notify(ObserverSlot::HistoryChange, &history, Some(&snapshot));
        Ok(())
    }

    /// Revert the most recent entry
    pub fn undo(&self, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        self.undo_step(scene)
    }

    /// Re-apply the most recently reverted entry
    pub fn redo(&self, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        self.redo_step(scene)
    }

    /// Undo up to `count` entries, returning how many were undone
    pub fn undo_multiple(&self, count: usize, scene: &mut dyn Scene) -> usize {
        let Ok(_guard) = self.guard() else {
            return 0;
        };
        let mut done = 0;
        while done < count && self.can_undo() {
            if self.undo_step(scene).is_err() {
                break;
            }
            done += 1;
        }
        done
    }

    /// Redo up to `count` entries, returning how many were redone
    pub fn redo_multiple(&self, count: usize, scene: &mut dyn Scene) -> usize {
        let Ok(_guard) = self.guard() else {
            return 0;
        };
        let mut done = 0;
        while done < count && self.can_redo() {
            if self.redo_step(scene).is_err() {
                break;
            }
            done += 1;
        }
        done
    }

    fn undo_step(&self, scene: &mut dyn Scene) -> HistoryResult<()> {
        let mut command = {
            let mut state = self.state.lock();
            state.ensure_no_transaction()?;
            match state.undo_stack.pop_back() {
                Some(command) => command,
                None => return rejected(HistoryError::NothingToUndo),
            }
        };

        if let Err(err) = command.undo(scene) {
            let err = HistoryError::failed(command.as_ref(), err);
            self.state.lock().undo_stack.push_back(command);
            return Err(err);
        }
        command.meta_mut().has_run = false;

        let snapshot = command.snapshot();
        log::debug!("Undid '{}'", snapshot.description);
        let history = {
            let mut state = self.state.lock();
            state.redo_stack.push(command);
            state.snapshot()
        };
        self.notify(ObserverSlot::Undo, &history, Some(&snapshot));
        self.notify(ObserverSlot::HistoryChange, &history, Some(&snapshot));
        Ok(())
    }

    fn redo_step(&self, scene: &mut dyn Scene) -> HistoryResult<()> {
        let mut command = {
            let mut state = self.state.lock();
            state.ensure_no_transaction()?;
            match state.redo_stack.pop() {
                Some(command) => command,
                None => return rejected(HistoryError::NothingToRedo),
            }
        };

        if let Err(err) = command.redo(scene) {
            let err = HistoryError::failed(command.as_ref(), err);
            self.state.lock().redo_stack.push(command);
            return Err(err);
        }
        command.meta_mut().has_run = true;

        let snapshot = command.snapshot();
        log::debug!("Redid '{}'", snapshot.description);
        let history = {
            let mut state = self.state.lock();
            state.undo_stack.push_back(command);
            state.snapshot()
        };
        self.notify(ObserverSlot::Redo, &history, Some(&snapshot));
        self.notify(ObserverSlot::HistoryChange, &history, Some(&snapshot));
        Ok(())
    }

    /// Start collecting executed commands into a single entry
    pub fn begin_transaction(&self, description: impl Into<String>) -> HistoryResult<()> {
        let _guard = self.guard()?;
        let mut state = self.state.lock();
        if let Some(open) = &state.transaction {
            let description = open.description().to_string();
            drop(state);
            return rejected(HistoryError::TransactionAlreadyOpen(description));
        }
        let transaction = GroupCommand::new(description);
        log::debug!("Began transaction '{}'", transaction.description());
        state.transaction = Some(transaction);
        Ok(())
    }

    /// Run `command` now and record it as already applied in the open transaction.
    ///
    /// Used for live previews such as dragging, where the scene must update
    /// before the edit is committed.
    pub fn apply_in_transaction(&self, mut command: Box<dyn Command>, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        if !self.in_transaction() {
            return rejected(HistoryError::NoTransaction);
        }
        if let Err(err) = command.execute(scene) {
            return Err(HistoryError::failed(command.as_ref(), err));
        }
        command.meta_mut().has_run = true;
        if let Some(transaction) = self.state.lock().transaction.as_mut() {
            transaction.add_applied(command);
        }
        Ok(())
    }

    /// Close the open transaction and record it as one entry.
    ///
    /// An empty transaction is discarded. If the group fails, every child it
    /// had applied is unwound and the transaction is gone.
    pub fn commit_transaction(&self, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        let Some(transaction) = self.state.lock().transaction.take() else {
            return rejected(HistoryError::NoTransaction);
        };
        if transaction.is_empty() {
            log::debug!("Committed empty transaction '{}'", transaction.description());
            return Ok(());
        }
        log::debug!(
            "Committing transaction '{}' with {} commands",
            transaction.description(),
            transaction.len()
        );
        self.record(Box::new(transaction), scene, false)
    }

    /// Discard the open transaction, reverting anything it already applied
    pub fn rollback_transaction(&self, scene: &mut dyn Scene) -> HistoryResult<()> {
        let _guard = self.guard()?;
        let Some(mut transaction) = self.state.lock().transaction.take() else {
            return rejected(HistoryError::NoTransaction);
        };
        log::debug!("Rolling back transaction '{}'", transaction.description());
        if transaction.has_applied_children() {
            if let Err(err) = transaction.undo(scene) {
                return Err(HistoryError::failed(&transaction, err));
            }
        }
        Ok(())
    }

    /// Mark the current state as saved
    pub fn set_save_point(&self) -> HistoryResult<()> {
        let _guard = self.guard()?;
        let history = {
            let mut state = self.state.lock();
            state.save_point = Some(state.undo_stack.len());
            log::info!("Save point set at {}", state.undo_stack.len());
            state.snapshot()
        };
        self.notify(ObserverSlot::SavePoint, &history, None);
        self.notify(ObserverSlot::HistoryChange, &history, None);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().is_dirty()
    }

    /// Undo or redo until the saved state is reached.
    ///
    /// Returns whether the full distance was covered.
    pub fn revert_to_save_point(&self, scene: &mut dyn Scene) -> HistoryResult<bool> {
        let _guard = self.guard()?;
        let (current, save_point) = {
            let state = self.state.lock();
            state.ensure_no_transaction()?;
            (state.undo_stack.len(), state.save_point)
        };
        let Some(target) = save_point else {
            log::warn!("Save point is no longer reachable");
            return Ok(false);
        };

        log::info!("Reverting from entry {} to save point {}", current, target);
        let mut done = 0;
        if current > target {
            while done < current - target && self.undo_step(scene).is_ok() {
                done += 1;
            }
            Ok(done == current - target)
        } else {
            while done < target - current && self.redo_step(scene).is_ok() {
                done += 1;
            }
            Ok(done == target - current)
        }
    }

    /// Drop every entry from both stacks
    pub fn clear(&self) -> HistoryResult<()> {
        let _guard = self.guard()?;
        let history = {
            let mut state = self.state.lock();
            state.save_point = if state.is_dirty() { None } else { Some(0) };
            state.undo_stack.clear();
            state.redo_stack.clear();
            state.snapshot()
        };
        log::debug!("History cleared");
        self.notify(ObserverSlot::HistoryChange, &history, None);
        Ok(())
    }

    /// Change the capacity, evicting the oldest entries at once if needed
    pub fn set_max_history(&self, max_history: usize) {
        let (evicted, history) = {
            let mut state = self.state.lock();
            state.config.max_history = max_history.max(1);
            (state.trim(), state.snapshot())
        };
        if evicted > 0 {
            self.notify(ObserverSlot::HistoryChange, &history, None);
        }
    }

    pub fn set_merge_enabled(&self, enabled: bool) {
        self.state.lock().config.merge_enabled = enabled;
    }

    pub fn set_merge_window(&self, window: Duration) {
        let mut state = self.state.lock();
        state.config = state.config.clone().with_merge_window(window);
    }

    pub fn config(&self) -> HistoryConfig {
        self.state.lock().config.clone()
    }

    /// Register the callback for `slot`, replacing any previous one
    pub fn set_callback<F>(&self, slot: ObserverSlot, callback: F)
    where
        F: Fn(&HistoryNotification) -> ObserverResult + Send + Sync + 'static,
    {
        self.observers.set(slot, std::sync::Arc::new(callback));
    }

    pub fn clear_callback(&self, slot: ObserverSlot) -> bool {
        self.observers.clear(slot)
    }

    pub fn history(&self) -> HistorySnapshot {
        self.state.lock().snapshot()
    }

    pub fn undo_count(&self) -> usize {
        self.state.lock().undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.state.lock().redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.state.lock().undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.state.lock().redo_stack.is_empty()
    }

    /// Descriptions of the next entries `undo` would revert, most recent first
    pub fn undo_descriptions(&self, limit: usize) -> Vec<String> {
        let state = self.state.lock();
        state
            .undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|command| command.description().to_string())
            .collect()
    }

    /// Descriptions of the next entries `redo` would re-apply, most recent first
    pub fn redo_descriptions(&self, limit: usize) -> Vec<String> {
        let state = self.state.lock();
        state
            .redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|command| command.description().to_string())
            .collect()
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    pub fn in_transaction(&self) -> bool {
        self.state.lock().transaction.is_some()
    }

    /// Number of commands collected by the open transaction
    pub fn transaction_len(&self) -> Option<usize> {
        self.state.lock().transaction.as_ref().map(GroupCommand::len)
    }
}

impl fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CommandManager")
            .field("undo_count", &state.undo_stack.len())
            .field("redo_count", &state.redo_stack.len())
            .field("save_point", &state.save_point)
            .field("transaction", &state.transaction.as_ref().map(|t| t.description().to_string()))
            .field("config", &state.config)
            .field("executing", &self.is_executing())
            .field("observers", &self.observers)
            .finish()
    }
}
