//! Reversible commands and the history that records them.
//!
//! Every mutation of a [`Scene`] is expressed as a [`Command`]: it captures
//! what it needs to reverse itself exactly, and the [`CommandManager`] moves
//! it between the undo and redo stacks.

mod group;
mod history;
mod observer;
mod property;
mod snapshot;
mod structure;
mod transform;
mod z_order;

use std::any::Any;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::element::ElementId;
use crate::error::{SceneError, SceneResult};
use crate::id_generator;
use crate::scene::Scene;
use crate::util::time;

pub use group::GroupCommand;
pub use history::{CommandManager, HistoryError, HistoryResult};
pub use observer::{HistoryCallback, HistoryNotification, HistorySnapshot, ObserverResult, ObserverSlot};
pub use property::{MultiPropertyChangeCommand, PropertyChangeCommand, PropertyEdit};
pub use snapshot::CommandSnapshot;
pub use structure::{CreateCommand, DeleteCommand};
pub use transform::{MoveCommand, ResizeCommand, RotateCommand};
pub use z_order::ZIndexCommand;

/// Default window within which two edits of the same targets coalesce
pub const MERGE_WINDOW: Duration = Duration::from_millis(300);

/// Result type for command operations
pub type CommandResult = Result<(), CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// The scene rejected a read or write
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The command parameters are invalid
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The command cannot run in its current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The command failed during execution
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Tag identifying the concrete command variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    Move,
    Resize,
    Rotate,
    Create,
    Delete,
    Property,
    MultiProperty,
    Group,
    ZIndex,
}

impl CommandKind {
    /// Whether two adjacent commands of this kind may coalesce
    pub fn is_mergeable(self) -> bool {
        matches!(
            self,
            CommandKind::Move
                | CommandKind::Resize
                | CommandKind::Rotate
                | CommandKind::Property
                | CommandKind::MultiProperty
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Move => "move",
            CommandKind::Resize => "resize",
            CommandKind::Rotate => "rotate",
            CommandKind::Create => "create",
            CommandKind::Delete => "delete",
            CommandKind::Property => "property",
            CommandKind::MultiProperty => "multiProperty",
            CommandKind::Group => "group",
            CommandKind::ZIndex => "zIndex",
        };
        f.write_str(name)
    }
}

/// Bookkeeping shared by every command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandMeta {
    /// Process-unique sequence number
    pub id: u64,
    /// Human-readable label for history UI
    pub description: String,
    /// Creation time in milliseconds since the UNIX epoch
    pub created_at: u64,
    /// True after execute/redo, false after undo
    pub has_run: bool,
}

impl CommandMeta {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: id_generator::generate_id(),
            description: description.into(),
            created_at: time::now_millis(),
            has_run: false,
        }
    }

    /// Metadata for the result of merging `later` into the command owning `self`.
    ///
    /// The merged entry keeps the earlier description and takes the later
    /// timestamp, so a continuous drag keeps coalescing.
    pub(crate) fn merged(&self, later: &CommandMeta) -> CommandMeta {
        CommandMeta {
            id: id_generator::generate_id(),
            description: self.description.clone(),
            created_at: later.created_at,
            has_run: false,
        }
    }
}

/// A reversible unit of work over one or more elements.
///
/// Implementors need not maintain `meta().has_run`. [`CommandManager`] and
/// [`GroupCommand`] set it after every successful execute, undo and redo.
pub trait Command: Send + fmt::Debug {
    fn kind(&self) -> CommandKind;

    fn meta(&self) -> &CommandMeta;

    fn meta_mut(&mut self) -> &mut CommandMeta;

    /// Elements this command touches, in a stable order
    fn targets(&self) -> Vec<ElementId>;

    /// Apply the command for the first time
    fn execute(&mut self, scene: &mut dyn Scene) -> CommandResult;

    /// Exactly reverse `execute`
    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult;

    /// Re-apply after an undo
    fn redo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        self.execute(scene)
    }

    /// Whether `other`, created after `self`, may be folded into it
    fn can_merge_with(&self, other: &dyn Command, window: Duration) -> bool {
        self.kind().is_mergeable()
            && self.kind() == other.kind()
            && self.targets() == other.targets()
            && time::elapsed_millis(self.meta().created_at, other.meta().created_at)
                < time::duration_millis(window)
    }

    /// A new command going from `self`'s before-state to `other`'s after-state
    fn merge_with(&self, _other: &dyn Command) -> Option<Box<dyn Command>> {
        None
    }

    /// Variant-specific before/after fields for the snapshot
    fn details(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;

    fn description(&self) -> &str {
        &self.meta().description
    }

    fn has_run(&self) -> bool {
        self.meta().has_run
    }

    /// Read-only projection for logging and history panels
    fn snapshot(&self) -> CommandSnapshot {
        CommandSnapshot::of(self)
    }

    /// Override the creation timestamp (milliseconds since the UNIX epoch)
    fn at(mut self, created_at: u64) -> Self
    where
        Self: Sized,
    {
        self.meta_mut().created_at = created_at;
        self
    }

    /// Override the history label
    fn described(mut self, description: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.meta_mut().description = description.into();
        self
    }
}

/// Reads one value per target, failing before anything is written
pub(crate) fn read_all<T>(
    scene: &dyn Scene,
    targets: &[ElementId],
    read: impl Fn(&dyn Scene, ElementId) -> SceneResult<T>,
) -> SceneResult<Vec<T>> {
    targets.iter().map(|id| read(scene, *id)).collect()
}

/// Writes one value per target. If a write fails, the targets already
/// written are restored to the values they held before the call.
pub(crate) fn write_all<T: Clone>(
    scene: &mut dyn Scene,
    targets: &[ElementId],
    values: &[T],
    read: impl Fn(&dyn Scene, ElementId) -> SceneResult<T>,
    write: impl Fn(&mut dyn Scene, ElementId, T) -> SceneResult<()>,
) -> CommandResult {
    if targets.len() != values.len() {
        return Err(CommandError::InvalidParameters(format!(
            "{} targets but {} values",
            targets.len(),
            values.len()
        )));
    }
    let current = read_all(&*scene, targets, &read)?;
    for (i, (id, value)) in targets.iter().zip(values).enumerate() {
        if let Err(err) = write(&mut *scene, *id, value.clone()) {
            for (restore_id, restore) in targets[..i].iter().zip(&current).rev() {
                if let Err(restore_err) = write(&mut *scene, *restore_id, restore.clone()) {
                    log::error!("Failed to restore element {}: {}", restore_id, restore_err);
                }
            }
            return Err(err.into());
        }
    }
    Ok(())
}

/// Rejects commands constructed without any target
pub(crate) fn require_targets(targets: &[ElementId]) -> CommandResult {
    if targets.is_empty() {
        Err(CommandError::InvalidParameters("command has no targets".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::element::Element;
    use egui::{Pos2, Vec2};

    #[test]
    fn test_kind_serializes_camel_case() {
        assert_eq!(serde_json::to_value(CommandKind::MultiProperty).unwrap(), "multiProperty");
        assert_eq!(serde_json::to_value(CommandKind::ZIndex).unwrap(), "zIndex");
        assert_eq!(CommandKind::Move.to_string(), "move");
    }

    #[test]
    fn test_meta_ids_increase() {
        let a = CommandMeta::new("a");
        let b = CommandMeta::new("b");
        assert!(b.id > a.id);
        assert!(!a.has_run);
    }

    #[test]
    fn test_write_all_restores_on_failure() {
        let mut doc = Document::new();
        let layer = doc.add_layer("Layer 0");
        let a = doc
            .add_element(layer, Element::new("a", Pos2::ZERO, Vec2::splat(10.0)))
            .unwrap();
        let b = doc
            .add_element(layer, Element::new("b", Pos2::ZERO, Vec2::splat(10.0)))
            .unwrap();

        let result = write_all(
            &mut doc,
            &[a, b],
            &[Vec2::splat(20.0), Vec2::splat(0.5)],
            |scene, id| scene.size(id),
            |scene, id, size| scene.set_size(id, size),
        );

        assert!(matches!(result, Err(CommandError::Scene(SceneError::InvalidSize(_)))));
        assert_eq!(doc.size(a).unwrap(), Vec2::splat(10.0));
        assert_eq!(doc.size(b).unwrap(), Vec2::splat(10.0));
    }
}
