use std::any::Any;
use std::time::Duration;

use serde_json::json;

use super::{Command, CommandError, CommandKind, CommandMeta, CommandResult};
use crate::element::ElementId;
use crate::scene::{Scene, ZOrder};

/// Reorder an element within its layer.
///
/// The resulting index depends on the layer at the time the reorder runs,
/// so it is read back from the scene afterwards rather than computed here.
#[derive(Debug, Clone)]
pub struct ZIndexCommand {
    meta: CommandMeta,
    target: ElementId,
    order: ZOrder,
    before: Option<usize>,
    after: Option<usize>,
}

impl ZIndexCommand {
    pub fn new(target: ElementId, order: ZOrder) -> Self {
        let description = match order {
            ZOrder::BringToFront => "Bring to front",
            ZOrder::SendToBack => "Send to back",
            ZOrder::BringForward => "Bring forward",
            ZOrder::SendBackward => "Send backward",
            ZOrder::To(_) => "Change stacking order",
        };
        Self {
            meta: CommandMeta::new(description),
            target,
            order,
            before: None,
            after: None,
        }
    }

    pub fn before(&self) -> Option<usize> {
        self.before
    }

    pub fn after(&self) -> Option<usize> {
        self.after
    }
}

impl Command for ZIndexCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ZIndex
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut CommandMeta {
        &mut self.meta
    }

    fn targets(&self) -> Vec<ElementId> {
        vec![self.target]
    }

    fn execute(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let before = scene.z_index(self.target)?;
        let after = scene.reorder(self.target, self.order)?;
        self.before = Some(before);
        self.after = Some(after);
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let before = self.before.ok_or_else(|| {
            CommandError::InvalidState(format!("'{}' has not been executed", self.meta.description))
        })?;
        scene.set_z_index(self.target, before)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn redo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        match self.after {
            Some(after) => {
                scene.set_z_index(self.target, after)?;
                self.meta.has_run = true;
                Ok(())
            }
            None => self.execute(scene),
        }
    }

    fn can_merge_with(&self, _other: &dyn Command, _window: Duration) -> bool {
        false
    }

    fn details(&self) -> serde_json::Value {
        json!({
            "order": self.order,
            "before": self.before,
            "after": self.after,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
