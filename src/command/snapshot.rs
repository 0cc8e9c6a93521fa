use serde::Serialize;

use super::{Command, CommandKind};
use crate::element::ElementId;

/// Plain-data projection of a command for debug logging and history panels.
///
/// This is a read-only view; it cannot be turned back into a live command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSnapshot {
    pub id: u64,
    pub kind: CommandKind,
    pub description: String,
    pub created_at: u64,
    pub has_run: bool,
    pub targets: Vec<ElementId>,
    /// Variant-specific before/after fields
    pub details: serde_json::Value,
}

impl CommandSnapshot {
    pub fn of<C: Command + ?Sized>(command: &C) -> Self {
        let meta = command.meta();
        Self {
            id: meta.id,
            kind: command.kind(),
            description: meta.description.clone(),
            created_at: meta.created_at,
            has_run: meta.has_run,
            targets: command.targets(),
            details: command.details(),
        }
    }

    /// Compact JSON form for log lines
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| format!("<unserializable snapshot: {err}>"))
    }
}
