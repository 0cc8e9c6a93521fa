use std::any::Any;

use egui::{Pos2, Vec2};
use paint_history::command::{
    CommandMeta, CommandResult, DeleteCommand, GroupCommand, MoveCommand, PropertyChangeCommand,
    ResizeCommand, ZIndexCommand,
};
use paint_history::{
    Bounds, Command, CommandKind, CommandManager, Document, Element, ElementId, HistoryError, LayerId,
    PropertyValue, Scene, ZOrder,
};

fn setup() -> (Document, LayerId, ElementId, ElementId) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut doc = Document::new();
    let layer = doc.add_layer("Layer 0");
    let a = doc
        .add_element(
            layer,
            Element::new("a", Pos2::new(0.0, 0.0), Vec2::splat(10.0)).with_property("opacity", 1.0),
        )
        .unwrap();
    let b = doc
        .add_element(layer, Element::new("b", Pos2::new(50.0, 0.0), Vec2::splat(10.0)))
        .unwrap();
    (doc, layer, a, b)
}

/// A command written outside the crate that never sets `has_run`
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
fn test_transaction_is_one_entry() {
    let (mut doc, layer, a, b) = setup();
    let manager = CommandManager::default();

    manager.begin_transaction("Arrange").unwrap();
    manager
        .execute(Box::new(MoveCommand::single(a, Vec2::new(5.0, 5.0))), &mut doc)
        .unwrap();
    manager
        .execute(Box::new(ZIndexCommand::new(a, ZOrder::BringToFront)), &mut doc)
        .unwrap();
    // Queued commands do not touch the scene before commit
    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
    assert_eq!(manager.transaction_len(), Some(2));
    assert_eq!(manager.undo_count(), 0);

    manager.commit_transaction(&mut doc).unwrap();
    assert!(!manager.in_transaction());
    assert_eq!(manager.undo_count(), 1);
    assert_eq!(manager.undo_descriptions(1), vec!["Arrange"]);
    assert_eq!(doc.children(layer).unwrap(), &[b, a]);

    manager.undo(&mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
    assert_eq!(doc.children(layer).unwrap(), &[a, b]);
}

#[test]
fn test_transaction_undoes_in_reverse() {
    let (mut doc, layer, a, b) = setup();
    let manager = CommandManager::default();

    // The delete captures a's index after the reorder put it on top
    manager.begin_transaction("Raise and remove").unwrap();
    manager
        .execute(Box::new(ZIndexCommand::new(a, ZOrder::BringToFront)), &mut doc)
        .unwrap();
    manager.execute(Box::new(DeleteCommand::single(a)), &mut doc).unwrap();
    manager.commit_transaction(&mut doc).unwrap();
    assert_eq!(doc.children(layer).unwrap(), &[b]);

    manager.undo(&mut doc).unwrap();
    assert_eq!(doc.children(layer).unwrap(), &[a, b]);

    manager.redo(&mut doc).unwrap();
    assert_eq!(doc.children(layer).unwrap(), &[b]);
}

#[test]
fn test_empty_transaction_commit_is_noop() {
    let (mut doc, _, _, _) = setup();
    let manager = CommandManager::default();
    manager.begin_transaction("Nothing").unwrap();
    manager.commit_transaction(&mut doc).unwrap();
    assert_eq!(manager.undo_count(), 0);
    assert!(!manager.is_dirty());
}

#[test]
fn test_live_preview_then_commit() {
    let (mut doc, _, a, _) = setup();
    let manager = CommandManager::default();

    manager.begin_transaction("Drag").unwrap();
    for step in 1..=3 {
        manager
            .apply_in_transaction(Box::new(MoveCommand::single(a, Vec2::new(2.0, 0.0))), &mut doc)
            .unwrap();
        assert_eq!(doc.position(a).unwrap().x, 2.0 * step as f32);
    }
    manager
        .execute(Box::new(PropertyChangeCommand::new(a, "opacity", 0.5)), &mut doc)
        .unwrap();

    manager.commit_transaction(&mut doc).unwrap();
    // Previewed moves are not applied a second time
    assert_eq!(doc.position(a).unwrap().x, 6.0);
    assert_eq!(doc.property(a, "opacity").unwrap(), PropertyValue::Number(0.5));

    manager.undo(&mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
    assert_eq!(doc.property(a, "opacity").unwrap(), PropertyValue::Number(1.0));
}

#[test]
fn test_rollback_reverts_previews() {
    let (mut doc, _, a, _) = setup();
    let manager = CommandManager::default();

    manager.begin_transaction("Drag").unwrap();
    manager
        .apply_in_transaction(Box::new(MoveCommand::single(a, Vec2::new(9.0, 9.0))), &mut doc)
        .unwrap();
    manager
        .execute(Box::new(MoveCommand::single(a, Vec2::new(1.0, 0.0))), &mut doc)
        .unwrap();
    manager.rollback_transaction(&mut doc).unwrap();

    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
    assert!(!manager.in_transaction());
    assert_eq!(manager.undo_count(), 0);
    assert_eq!(manager.rollback_transaction(&mut doc), Err(HistoryError::NoTransaction));
}

#[test]
fn test_failed_commit_unwinds_everything() {
    let (mut doc, _, a, b) = setup();
    let manager = CommandManager::default();

    manager.begin_transaction("Broken").unwrap();
    manager
        .apply_in_transaction(Box::new(MoveCommand::single(a, Vec2::new(3.0, 0.0))), &mut doc)
        .unwrap();
    manager
        .execute(Box::new(MoveCommand::single(b, Vec2::new(3.0, 0.0))), &mut doc)
        .unwrap();
    manager
        .execute(
            Box::new(ResizeCommand::single(b, Bounds::new(Pos2::ZERO, Vec2::splat(1.0)))),
            &mut doc,
        )
        .unwrap();

    let err = manager.commit_transaction(&mut doc).unwrap_err();
    assert!(matches!(err, HistoryError::CommandFailed { .. }));
    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
    assert_eq!(doc.position(b).unwrap(), Pos2::new(50.0, 0.0));
    assert_eq!(manager.undo_count(), 0);
    assert!(!manager.in_transaction());
}

#[test]
fn test_apply_requires_open_transaction() {
    let (mut doc, _, a, _) = setup();
    let manager = CommandManager::default();
    let err = manager
        .apply_in_transaction(Box::new(MoveCommand::single(a, Vec2::X)), &mut doc)
        .unwrap_err();
    assert_eq!(err, HistoryError::NoTransaction);
    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
}

#[test]
fn test_execute_group() {
    let (mut doc, _, a, b) = setup();
    let manager = CommandManager::default();
    manager
        .execute_group(
            vec![
                Box::new(MoveCommand::single(a, Vec2::new(1.0, 0.0)).at(0)),
                Box::new(MoveCommand::single(b, Vec2::new(1.0, 0.0)).at(0)),
            ],
            "Nudge both",
            &mut doc,
        )
        .unwrap();
    // Groups never merge, even with a compatible command right after
    manager
        .execute(Box::new(MoveCommand::single(a, Vec2::new(1.0, 0.0)).at(0)), &mut doc)
        .unwrap();
    assert_eq!(manager.undo_count(), 2);

    manager.execute_group(Vec::new(), "Empty", &mut doc).unwrap();
    assert_eq!(manager.undo_count(), 2);

    assert_eq!(manager.undo_multiple(2, &mut doc), 2);
    assert_eq!(doc.position(a).unwrap(), Pos2::ZERO);
    assert_eq!(doc.position(b).unwrap(), Pos2::new(50.0, 0.0));
}

#[test]
fn test_group_built_by_hand() {
    let (mut doc, _, a, b) = setup();
    let manager = CommandManager::default();
    let mut group = GroupCommand::new("Swap opacity");
    group.add(Box::new(PropertyChangeCommand::new(a, "opacity", 0.0)));
    group.add(Box::new(MoveCommand::single(b, Vec2::Y)));
    assert_eq!(group.len(), 2);
    assert_eq!(group.targets(), vec![a, b]);

    manager.execute(Box::new(group), &mut doc).unwrap();
    assert_eq!(manager.history().last_command.unwrap().kind.to_string(), "group");
}

#[test]
fn test_custom_command_in_group_is_undone() {
    let (mut doc, _, a, _) = setup();
    let manager = CommandManager::default();

    manager.execute_group(vec![Nudge::boxed(a)], "Nudge", &mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap().x, 1.0);
    assert!(manager.history().last_command.unwrap().has_run);

    manager.undo(&mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap().x, 0.0);

    manager.redo(&mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap().x, 1.0);
}

#[test]
fn test_custom_command_preview_commit_and_rollback() {
    let (mut doc, _, a, _) = setup();
    let manager = CommandManager::default();

    manager.begin_transaction("Drag").unwrap();
    manager.apply_in_transaction(Nudge::boxed(a), &mut doc).unwrap();
    manager.apply_in_transaction(Nudge::boxed(a), &mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap().x, 2.0);
    manager.rollback_transaction(&mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap().x, 0.0);

    manager.begin_transaction("Drag").unwrap();
    manager.apply_in_transaction(Nudge::boxed(a), &mut doc).unwrap();
    manager.execute(Nudge::boxed(a), &mut doc).unwrap();
    manager.commit_transaction(&mut doc).unwrap();
    // The preview is not applied a second time
    assert_eq!(doc.position(a).unwrap().x, 2.0);

    manager.undo(&mut doc).unwrap();
    assert_eq!(doc.position(a).unwrap().x, 0.0);
}
