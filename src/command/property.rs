use std::any::Any;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use super::{Command, CommandError, CommandKind, CommandMeta, CommandResult};
use crate::element::{ElementId, PropertyValue};
use crate::scene::Scene;
use crate::util::time;

/// Change one named property of one element
#[derive(Debug, Clone)]
pub struct PropertyChangeCommand {
    meta: CommandMeta,
    target: ElementId,
    name: String,
    before: Option<PropertyValue>,
    after: PropertyValue,
}

impl PropertyChangeCommand {
    pub fn new(target: ElementId, name: impl Into<String>, after: impl Into<PropertyValue>) -> Self {
        let name = name.into();
        Self {
            meta: CommandMeta::new(format!("Change {}", name)),
            target,
            name,
            before: None,
            after: after.into(),
        }
    }

    /// Use a known previous value instead of reading it from the scene
    pub fn with_before(mut self, before: impl Into<PropertyValue>) -> Self {
        self.before = Some(before.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn before(&self) -> Option<&PropertyValue> {
        self.before.as_ref()
    }

    pub fn after(&self) -> &PropertyValue {
        &self.after
    }
}

impl Command for PropertyChangeCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::Property
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
        let before = match &self.before {
            Some(before) => before.clone(),
            None => scene.property(self.target, &self.name)?,
        };
        scene.set_property(self.target, &self.name, self.after.clone())?;
        self.before = Some(before);
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        let before = self.before.clone().ok_or_else(|| {
            CommandError::InvalidState(format!("'{}' has not been executed", self.meta.description))
        })?;
        scene.set_property(self.target, &self.name, before)?;
        self.meta.has_run = false;
        Ok(())
    }

    fn can_merge_with(&self, other: &dyn Command, window: Duration) -> bool {
        let same_property = other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| other.name == self.name);
        same_property
            && self.target == other.targets()[0]
            && time::elapsed_millis(self.meta.created_at, other.meta().created_at)
                < time::duration_millis(window)
    }

    fn merge_with(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<Self>()?;
        Some(Box::new(PropertyChangeCommand {
            meta: self.meta.merged(&other.meta),
            target: self.target,
            name: self.name.clone(),
            before: self.before.clone(),
            after: other.after.clone(),
        }))
    }

    fn details(&self) -> serde_json::Value {
        json!({
            "property": self.name,
            "before": self.before,
            "after": self.after,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One entry of a [`MultiPropertyChangeCommand`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyEdit {
    pub target: ElementId,
    pub name: String,
    pub before: Option<PropertyValue>,
    pub after: PropertyValue,
}

impl PropertyEdit {
    pub fn new(target: ElementId, name: impl Into<String>, after: impl Into<PropertyValue>) -> Self {
        Self {
            target,
            name: name.into(),
            before: None,
            after: after.into(),
        }
    }

    pub fn with_before(mut self, before: impl Into<PropertyValue>) -> Self {
        self.before = Some(before.into());
        self
    }
}

/// Change several properties, possibly across several elements, as one entry.
///
/// Applied in order and reverted in reverse order, so repeated edits of the
/// same property restore the earliest value.
#[derive(Debug, Clone)]
pub struct MultiPropertyChangeCommand {
    meta: CommandMeta,
    edits: Vec<PropertyEdit>,
}

impl MultiPropertyChangeCommand {
    pub fn new(edits: Vec<PropertyEdit>) -> Self {
        Self {
            meta: CommandMeta::new(format!("Change {} properties", edits.len())),
            edits,
        }
    }

    pub fn edits(&self) -> &[PropertyEdit] {
        &self.edits
    }

    fn keys(&self) -> impl Iterator<Item = (ElementId, &str)> {
        self.edits.iter().map(|edit| (edit.target, edit.name.as_str()))
    }

    fn revert(scene: &mut dyn Scene, applied: &[(ElementId, String, PropertyValue)]) {
        for (target, name, value) in applied.iter().rev() {
            if let Err(err) = scene.set_property(*target, name, value.clone()) {
                log::error!("Failed to restore property `{}` of element {}: {}", name, target, err);
            }
        }
    }
}

impl Command for MultiPropertyChangeCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::MultiProperty
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut CommandMeta {
        &mut self.meta
    }

    fn targets(&self) -> Vec<ElementId> {
        let mut targets = Vec::new();
        for edit in &self.edits {
            if !targets.contains(&edit.target) {
                targets.push(edit.target);
            }
        }
        targets
    }

    fn execute(&mut self, scene: &mut dyn Scene) -> CommandResult {
        if self.edits.is_empty() {
            return Err(CommandError::InvalidParameters("no property edits".to_string()));
        }
        let mut applied = Vec::with_capacity(self.edits.len());
        let mut captured = Vec::with_capacity(self.edits.len());
        for edit in &self.edits {
            let step = scene.property(edit.target, &edit.name).and_then(|current| {
                scene.set_property(edit.target, &edit.name, edit.after.clone())?;
                Ok(current)
            });
            match step {
                Ok(current) => {
                    captured.push(edit.before.clone().unwrap_or_else(|| current.clone()));
                    applied.push((edit.target, edit.name.clone(), current));
                }
                Err(err) => {
                    Self::revert(scene, &applied);
                    return Err(err.into());
                }
            }
        }
        for (edit, before) in self.edits.iter_mut().zip(captured) {
            edit.before = Some(before);
        }
        self.meta.has_run = true;
        Ok(())
    }

    fn undo(&mut self, scene: &mut dyn Scene) -> CommandResult {
        if self.edits.iter().any(|edit| edit.before.is_none()) {
            return Err(CommandError::InvalidState(format!(
                "'{}' has not been executed",
                self.meta.description
            )));
        }
        let mut applied = Vec::with_capacity(self.edits.len());
        for edit in self.edits.iter().rev() {
            let Some(before) = &edit.before else { continue };
            let step = scene.property(edit.target, &edit.name).and_then(|current| {
                scene.set_property(edit.target, &edit.name, before.clone())?;
                Ok(current)
            });
            match step {
                Ok(current) => applied.push((edit.target, edit.name.clone(), current)),
                Err(err) => {
                    Self::revert(scene, &applied);
                    return Err(err.into());
                }
            }
        }
        self.meta.has_run = false;
        Ok(())
    }

    fn can_merge_with(&self, other: &dyn Command, window: Duration) -> bool {
        let Some(other) = other.as_any().downcast_ref::<Self>() else {
            return false;
        };
        self.keys().eq(other.keys())
            && time::elapsed_millis(self.meta.created_at, other.meta.created_at)
                < time::duration_millis(window)
    }

    fn merge_with(&self, other: &dyn Command) -> Option<Box<dyn Command>> {
        let other = other.as_any().downcast_ref::<Self>()?;
        let edits = self
            .edits
            .iter()
            .zip(&other.edits)
            .map(|(first, last)| PropertyEdit {
                target: first.target,
                name: first.name.clone(),
                before: first.before.clone(),
                after: last.after.clone(),
            })
            .collect();
        Some(Box::new(MultiPropertyChangeCommand {
            meta: self.meta.merged(&other.meta),
            edits,
        }))
    }

    fn details(&self) -> serde_json::Value {
        json!({ "edits": self.edits })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
