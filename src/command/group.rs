use std::any::Any;
use std::time::Duration;

use serde_json::json;

use super::{Command, CommandKind, CommandMeta, CommandResult};
use crate::element::ElementId;
use crate::scene::Scene;

/// An ordered batch of commands recorded as a single history entry.
///
/// Children run forward on execute/redo and backward on undo. Children that
/// already ran (see [`GroupCommand::add_applied`]) are skipped on execute, so
/// a transaction can mix live previews with deferred edits. The group keeps
/// each child's `has_run` flag current itself.
#[derive(Debug)]
pub struct GroupCommand {
    meta: CommandMeta,
    children: Vec<Box<dyn Command>>,
}

impl GroupCommand {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            meta: CommandMeta::new(description),
            children: Vec::new(),
        }
    }

    pub fn from_commands(description: impl Into<String>, children: Vec<Box<dyn Command>>) -> Self {
        Self {
            meta: CommandMeta::new(description),
            children,
        }
    }

    /// Append a command to run when the group executes
    pub fn add(&mut self, command: Box<dyn Command>) {
        self.children.push(command);
    }

    /// Append a command the caller has already executed
    pub fn add_applied(&mut self, mut command: Box<dyn Command>) {
        command.meta_mut().has_run = true;
        self.children.push(command);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// True if any child is currently applied to the scene
    pub fn has_applied_children(&self) -> bool {
        self.children.iter().any(|child| child.has_run())
    }

    pub fn children(&self) -> impl Iterator<Item = &dyn Command> {
        self.children.iter().map(|child| child.as_ref())
    }

    /// Undo every applied child, newest first, logging failures
    fn unwind(&mut self, scene: &mut dyn Scene) {
        for child in self.children.iter_mut().rev() {
            if child.has_run() {
                match child.undo(scene) {
                    Ok(()) => child.meta_mut().has_run = false,
                    Err(err) => log::error!("Failed to unwind '{}': {}", child.description(), err),
                }
            }
        }
    }
}

impl Command for GroupCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Group
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut CommandMeta {
        &mut self.meta
    }

    fn targets(&self) -> Vec<ElementId> {
        let mut targets = Vec::new();
        for id in self.children.iter().flat_map(|child| child.targets()) {
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        targets
    }

    fn execute(&mut self, scene: &mut dyn Scene) -> CommandResult {
        for i in 0..self.children.len() {
            if self.children[i].has_run() {
                continue;
            }
            if let Err(err) = self.children[i].execute(scene) {
                log::warn!(
                    "'{}' failed inside '{}', unwinding group",
                    self.children[i].description(),
                    self.meta.description
                );
                self.unwind(scene);
                return Err(err);
            }
            self.children[i].meta_mut().has_run = true;
        }
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        for child in self.children.iter_mut().rev() {
            if child.has_run() {
                child.undo(scene)?;
                child.meta_mut().has_run = false;
            }
        }
        self.meta.has_run = false;
        Ok(())
    }

    fn redo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        for i in 0..self.children.len() {
            if self.children[i].has_run() {
                continue;
            }
            if let Err(err) = self.children[i].redo(scene) {
                self.unwind(scene);
                return Err(err);
            }
            self.children[i].meta_mut().has_run = true;
        }
        self.meta.has_run = true;
        Ok(())
    }

    fn can_merge_with(&self, _other: &dyn Command, _window: Duration) -> bool {
        false
    }

    fn details(&self) -> serde_json::Value {
        let children: Vec<_> = self.children.iter().map(|child| child.snapshot()).collect();
        json!({ "children": children })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{MoveCommand, PropertyChangeCommand};
    use crate::document::Document;
    use crate::element::{Element, PropertyValue};
    use egui::{Pos2, Vec2};

    fn setup() -> (Document, ElementId) {
        let mut doc = Document::new();
        let layer = doc.add_layer("Layer 0");
        let id = doc
            .add_element(
                layer,
                Element::new("a", Pos2::new(0.0, 0.0), Vec2::splat(10.0)).with_property("opacity", 1.0),
            )
            .unwrap();
        (doc, id)
    }

    /// Shifts x by one and leaves `has_run` alone
    #[derive(Debug)]
    struct Nudge {
        meta: CommandMeta,
        target: ElementId,
    }

    impl Nudge {
        fn boxed(target: ElementId) -> Box<dyn Command> {
            Box::new(Self {
                meta: CommandMeta::new("Nudge"),
                target,
            })
        }

        fn shift(&self, scene: &mut dyn Scene, dx: f32) -> CommandResult {
            let position = scene.position(self.target)?;
            scene.set_position(self.target, position + Vec2::new(dx, 0.0))?;
            Ok(())
        }
    }

    impl Command for Nudge {
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
            vec![self.target]
        }
        fn execute(&mut self, scene: &mut dyn Scene) -> CommandResult {
            self.shift(scene, 1.0)
        }
        fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
            self.shift(scene, -1.0)
        }
        fn details(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_group_undo_runs_in_reverse() {
        let (mut doc, id) = setup();
        // The second move depends on the first having captured its origin
        let mut group = GroupCommand::from_commands(
            "Nudge twice",
            vec![
                Box::new(MoveCommand::single(id, Vec2::new(10.0, 0.0))),
                Box::new(MoveCommand::single(id, Vec2::new(0.0, 5.0))),
            ],
        );

        group.execute(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap(), Pos2::new(10.0, 5.0));

        group.undo(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap(), Pos2::ZERO);

        group.redo(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap(), Pos2::new(10.0, 5.0));
    }

    #[test]
    fn test_group_failure_unwinds_applied_children() {
        let (mut doc, id) = setup();
        let mut group = GroupCommand::from_commands(
            "Broken",
            vec![
                Box::new(MoveCommand::single(id, Vec2::new(10.0, 0.0))),
                Box::new(PropertyChangeCommand::new(id, "missing", 2.0)),
            ],
        );

        assert!(group.execute(&mut doc).is_err());
        assert!(!group.has_run());
        assert!(!group.has_applied_children());
        assert_eq!(doc.position(id).unwrap(), Pos2::ZERO);
    }

    #[test]
    fn test_group_skips_applied_children() {
        let (mut doc, id) = setup();
        let mut preview = PropertyChangeCommand::new(id, "opacity", 0.5);
        preview.execute(&mut doc).unwrap();

        let mut group = GroupCommand::new("Fade and move");
        assert!(group.is_empty());
        group.add_applied(Box::new(preview));
        group.add(Box::new(MoveCommand::single(id, Vec2::new(1.0, 1.0))));
        assert_eq!(group.len(), 2);
        assert!(group.has_applied_children());

        group.execute(&mut doc).unwrap();
        assert_eq!(doc.property(id, "opacity").unwrap(), PropertyValue::Number(0.5));
        assert_eq!(doc.position(id).unwrap(), Pos2::new(1.0, 1.0));

        group.undo(&mut doc).unwrap();
        assert_eq!(doc.property(id, "opacity").unwrap(), PropertyValue::Number(1.0));
        assert_eq!(doc.position(id).unwrap(), Pos2::ZERO);
    }

    #[test]
    fn test_group_snapshot_lists_children() {
        let (_, id) = setup();
        let group = GroupCommand::from_commands(
            "Batch",
            vec![Box::new(MoveCommand::single(id, Vec2::X))],
        );
        let snapshot = group.snapshot();
        assert_eq!(snapshot.kind, CommandKind::Group);
        assert_eq!(snapshot.targets, vec![id]);
        assert_eq!(snapshot.details["children"][0]["kind"], "move");
    }

    #[test]
    fn test_group_tracks_children_that_ignore_has_run() {
        let (mut doc, id) = setup();
        let mut group = GroupCommand::from_commands("Nudge twice", vec![Nudge::boxed(id), Nudge::boxed(id)]);

        group.execute(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap().x, 2.0);
        assert!(group.children().all(|child| child.has_run()));

        group.undo(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap().x, 0.0);
        assert!(!group.has_applied_children());

        group.redo(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap().x, 2.0);
    }

    #[test]
    fn test_add_applied_marks_child_as_run() {
        let (mut doc, id) = setup();
        let mut preview = Nudge::boxed(id);
        preview.execute(&mut doc).unwrap();
        assert!(!preview.has_run());

        let mut group = GroupCommand::new("Drag");
        group.add_applied(preview);
        group.add(Nudge::boxed(id));
        assert!(group.has_applied_children());

        // Only the deferred child runs
        group.execute(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap().x, 2.0);

        group.undo(&mut doc).unwrap();
        assert_eq!(doc.position(id).unwrap().x, 0.0);
    }
}
