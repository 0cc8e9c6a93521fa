use std::any::Any;
use std::time::Duration;

use serde_json::json;

use super::{Command, CommandError, CommandKind, CommandMeta, CommandResult, require_targets};
use crate::element::ElementId;
use crate::layer::LayerId;
use crate::scene::{Placement, Scene};

/// Attach an existing, detached element to a layer.
///
/// The element keeps its identity while detached, so commands recorded
/// before an undo/redo cycle still resolve to it.
#[derive(Debug, Clone)]
pub struct CreateCommand {
    meta: CommandMeta,
    target: ElementId,
    layer: LayerId,
    index: Option<usize>,
    placed_at: Option<usize>,
}

impl CreateCommand {
    /// Stack `target` on top of `layer`
    pub fn new(target: ElementId, layer: LayerId) -> Self {
        Self {
            meta: CommandMeta::new("Create element"),
            target,
            layer,
            index: None,
            placed_at: None,
        }
    }

    /// Insert at a specific z index instead of on top
    pub fn at_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Z index the element landed on during the last execution
    pub fn placed_at(&self) -> Option<usize> {
        self.placed_at
    }
}

impl Command for CreateCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Create
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
        let index = scene.attach(self.target, self.layer, self.index)?;
        self.placed_at = Some(index);
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        scene.detach(self.target)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn redo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let index = self.placed_at.or(self.index);
        self.placed_at = Some(scene.attach(self.target, self.layer, index)?);
        self.meta.has_run = true;
        Ok(())
    }

    fn can_merge_with(&self, _other: &dyn Command, _window: Duration) -> bool {
        false
    }

    fn details(&self) -> serde_json::Value {
        json!({
            "layer": self.layer,
            "index": self.index,
            "placedAt": self.placed_at,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Detach one or more elements from their layers.
///
/// Each element's layer and z index are captured before anything is removed,
/// and undo reinserts them at exactly those positions.
#[derive(Debug, Clone)]
pub struct DeleteCommand {
    meta: CommandMeta,
    targets: Vec<ElementId>,
    placements: Vec<Placement>,
}

impl DeleteCommand {
    pub fn new(targets: Vec<ElementId>) -> Self {
        let description = if targets.len() == 1 {
            "Delete element".to_string()
        } else {
            format!("Delete {} elements", targets.len())
        };
        Self {
            meta: CommandMeta::new(description),
            targets,
            placements: Vec::new(),
        }
    }

    pub fn single(target: ElementId) -> Self {
        Self::new(vec![target])
    }

    /// Captured placements, in target order
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Reinserts targets bottom-up so each lands on its recorded index
    fn reinsert(scene: &mut dyn Scene, entries: &[(ElementId, Placement)]) -> CommandResult {
        let mut ordered: Vec<&(ElementId, Placement)> = entries.iter().collect();
        ordered.sort_by_key(|(_, placement)| placement.index);
        for (id, placement) in ordered {
            scene.attach(*id, placement.layer, Some(placement.index))?;
        }
        Ok(())
    }
}

impl Command for DeleteCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Delete
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut CommandMeta {
        &mut self.meta
    }

    fn targets(&self) -> Vec<ElementId> {
        self.targets.clone()
    }

    fn execute(&mut self, scene: &mut dyn Scene) -> CommandResult {
        require_targets(&self.targets)?;
        let placements = self
            .targets
            .iter()
            .map(|id| scene.placement(*id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut removed = Vec::with_capacity(self.targets.len());
        for (id, placement) in self.targets.iter().zip(&placements) {
            if let Err(err) = scene.detach(*id) {
                if let Err(restore_err) = Self::reinsert(scene, &removed) {
                    log::error!("Failed to reinsert deleted elements: {}", restore_err);
                }
                return Err(err.into());
            }
            removed.push((*id, *placement));
        }

        self.placements = placements;
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        if self.placements.len() != self.targets.len() {
            return Err(CommandError::InvalidState(format!(
                "'{}' has not been executed",
                self.meta.description
            )));
        }
        let entries: Vec<(ElementId, Placement)> = self
            .targets
            .iter()
            .copied()
            .zip(self.placements.iter().copied())
            .collect();
        Self::reinsert(scene, &entries)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn can_merge_with(&self, _other: &dyn Command, _window: Duration) -> bool {
        false
    }

    fn details(&self) -> serde_json::Value {
        json!({ "placements": self.placements })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
