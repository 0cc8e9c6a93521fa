use std::any::Any;

use egui::{Pos2, Vec2};
use serde_json::json;

use super::{Command, CommandError, CommandKind, CommandMeta, CommandResult, read_all, require_targets, write_all};
use crate::element::{Bounds, ElementId};
use crate::error::SceneResult;
use crate::scene::Scene;

fn read_position(scene: &dyn Scene, id: ElementId) -> SceneResult<Pos2> {
    scene.position(id)
}

fn write_position(scene: &mut dyn Scene, id: ElementId, position: Pos2) -> SceneResult<()> {
    scene.set_position(id, position)
}

fn read_bounds(scene: &dyn Scene, id: ElementId) -> SceneResult<Bounds> {
    Ok(Bounds {
        position: scene.position(id)?,
        size: scene.size(id)?,
        scale: scene.scale(id)?,
    })
}

// Size goes first: it is the only write a scene is expected to validate.
fn write_bounds(scene: &mut dyn Scene, id: ElementId, bounds: Bounds) -> SceneResult<()> {
    scene.set_size(id, bounds.size)?;
    scene.set_scale(id, bounds.scale)?;
    scene.set_position(id, bounds.position)
}

fn read_rotation(scene: &dyn Scene, id: ElementId) -> SceneResult<f32> {
    scene.rotation(id)
}

fn write_rotation(scene: &mut dyn Scene, id: ElementId, radians: f32) -> SceneResult<()> {
    scene.set_rotation(id, radians)
}

fn not_executed(meta: &CommandMeta) -> CommandError {
    CommandError::InvalidState(format!("'{}' has not been executed", meta.description))
}

/// Translate one or more elements by a shared delta.
///
/// Original positions are captured on first execution (or supplied by the
/// caller for edits that were previewed live), and every execution sets
/// `original + delta`, so running it twice lands in the same place.
#[derive(Debug, Clone)]
pub struct MoveCommand {
    meta: CommandMeta,
    targets: Vec<ElementId>,
    delta: Vec2,
    originals: Option<Vec<Pos2>>,
}

impl MoveCommand {
    pub fn new(targets: Vec<ElementId>, delta: Vec2) -> Self {
        let description = if targets.len() == 1 {
            "Move element".to_string()
        } else {
            format!("Move {} elements", targets.len())
        };
        Self {
            meta: CommandMeta::new(description),
            targets,
            delta,
            originals: None,
        }
    }

    pub fn single(target: ElementId, delta: Vec2) -> Self {
        Self::new(vec![target], delta)
    }

    /// Use known pre-move positions instead of reading them from the scene
    pub fn with_originals(mut self, originals: Vec<Pos2>) -> Self {
        self.originals = Some(originals);
        self
    }

    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    pub fn originals(&self) -> Option<&[Pos2]> {
        self.originals.as_deref()
    }
}

impl Command for MoveCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Move
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
        let originals = match &self.originals {
            Some(originals) => originals.clone(),
            None => read_all(scene, &self.targets, read_position)?,
        };
        let moved: Vec<Pos2> = originals.iter().map(|pos| *pos + self.delta).collect();
        write_all(scene, &self.targets, &moved, read_position, write_position)?;
        self.originals = Some(originals);
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let originals = self.originals.as_ref().ok_or_else(|| not_executed(&self.meta))?;
        write_all(scene, &self.targets, originals, read_position, write_position)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn merge_with(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<Self>()?;
        Some(Box::new(MoveCommand {
            meta: self.meta.merged(&other.meta),
            targets: self.targets.clone(),
            delta: self.delta + other.delta,
            originals: self.originals.clone(),
        }))
    }

    fn details(&self) -> serde_json::Value {
        json!({
            "delta": [self.delta.x, self.delta.y],
            "originals": self.originals.as_ref().map(|originals| {
                originals.iter().map(|pos| [pos.x, pos.y]).collect::<Vec<_>>()
            }),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Set position, size and scale of one or more elements to explicit values
#[derive(Debug, Clone)]
pub struct ResizeCommand {
    meta: CommandMeta,
    targets: Vec<ElementId>,
    before: Option<Vec<Bounds>>,
    after: Vec<Bounds>,
}

impl ResizeCommand {
    pub fn new(changes: Vec<(ElementId, Bounds)>) -> Self {
        let (targets, after): (Vec<_>, Vec<_>) = changes.into_iter().unzip();
        let description = if targets.len() == 1 {
            "Resize element".to_string()
        } else {
            format!("Resize {} elements", targets.len())
        };
        Self {
            meta: CommandMeta::new(description),
            targets,
            before: None,
            after,
        }
    }

    pub fn single(target: ElementId, bounds: Bounds) -> Self {
        Self::new(vec![(target, bounds)])
    }

    /// Use known pre-resize bounds instead of reading them from the scene
    pub fn with_before(mut self, before: Vec<Bounds>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn before(&self) -> Option<&[Bounds]> {
        self.before.as_deref()
    }

    pub fn after(&self) -> &[Bounds] {
        &self.after
    }
}

impl Command for ResizeCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Resize
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
        let before = match &self.before {
            Some(before) => before.clone(),
            None => read_all(scene, &self.targets, read_bounds)?,
        };
        write_all(scene, &self.targets, &self.after, read_bounds, write_bounds)?;
        self.before = Some(before);
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let before = self.before.as_ref().ok_or_else(|| not_executed(&self.meta))?;
        write_all(scene, &self.targets, before, read_bounds, write_bounds)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn merge_with(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<Self>()?;
        Some(Box::new(ResizeCommand {
            meta: self.meta.merged(&other.meta),
            targets: self.targets.clone(),
            before: self.before.clone(),
            after: other.after.clone(),
        }))
    }

    fn details(&self) -> serde_json::Value {
        json!({
            "before": self.before,
            "after": self.after,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Set the rotation of one or more elements to explicit angles (radians)
#[derive(Debug, Clone)]
pub struct RotateCommand {
    meta: CommandMeta,
    targets: Vec<ElementId>,
    before: Option<Vec<f32>>,
    after: Vec<f32>,
}

impl RotateCommand {
    pub fn new(changes: Vec<(ElementId, f32)>) -> Self {
        let (targets, after): (Vec<_>, Vec<_>) = changes.into_iter().unzip();
        let description = if targets.len() == 1 {
            "Rotate element".to_string()
        } else {
            format!("Rotate {} elements", targets.len())
        };
        Self {
            meta: CommandMeta::new(description),
            targets,
            before: None,
            after,
        }
    }

    pub fn single(target: ElementId, radians: f32) -> Self {
        Self::new(vec![(target, radians)])
    }

    /// Use known pre-rotation angles instead of reading them from the scene
    pub fn with_before(mut self, before: Vec<f32>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn before(&self) -> Option<&[f32]> {
        self.before.as_deref()
    }

    pub fn after(&self) -> &[f32] {
        &self.after
    }
}

impl Command for RotateCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Rotate
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
        let before = match &self.before {
            Some(before) => before.clone(),
            None => read_all(scene, &self.targets, read_rotation)?,
        };
        write_all(scene, &self.targets, &self.after, read_rotation, write_rotation)?;
        self.before = Some(before);
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let before = self.before.as_ref().ok_or_else(|| not_executed(&self.meta))?;
        write_all(scene, &self.targets, before, read_rotation, write_rotation)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn merge_with(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<Self>()?;
        Some(Box::new(RotateCommand {
            meta: self.meta.merged(&other.meta),
            targets: self.targets.clone(),
            before: self.before.clone(),
            after: other.after.clone(),
        }))
    }

    fn details(&self) -> serde_json::Value {
        json!({
            "before": self.before,
            "after": self.after,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
