//! The capability contract commands need from the objects they edit.
//!
//! The engine never owns elements. Every command receives a `&mut dyn Scene`
//! and reads or writes element state through it, so any scene graph that can
//! answer these calls can be driven by the history. [`crate::Document`] is the
//! in-memory implementation used by the tests.

use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

use crate::element::{ElementId, PropertyValue};
use crate::error::{SceneError, SceneResult};
use crate::layer::LayerId;

/// Where an element sits: its layer and its z index within that layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub layer: LayerId,
    pub index: usize,
}

/// Reorder primitive applied by z-index commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZOrder {
    BringToFront,
    SendToBack,
    BringForward,
    SendBackward,
    To(usize),
}

impl ZOrder {
    /// The index an element at `current` lands on in a layer of `len` elements
    pub fn resolve(self, current: usize, len: usize) -> usize {
        let top = len.saturating_sub(1);
        match self {
            ZOrder::BringToFront => top,
            ZOrder::SendToBack => 0,
            ZOrder::BringForward => (current + 1).min(top),
            ZOrder::SendBackward => current.saturating_sub(1),
            ZOrder::To(index) => index.min(top),
        }
    }
}

/// Get/set access to the editable state of elements and their layers.
pub trait Scene {
    fn contains(&self, id: ElementId) -> bool;

    fn position(&self, id: ElementId) -> SceneResult<Pos2>;
    fn set_position(&mut self, id: ElementId, position: Pos2) -> SceneResult<()>;

    fn size(&self, id: ElementId) -> SceneResult<Vec2>;
    fn set_size(&mut self, id: ElementId, size: Vec2) -> SceneResult<()>;

    fn scale(&self, id: ElementId) -> SceneResult<Vec2>;
    fn set_scale(&mut self, id: ElementId, scale: Vec2) -> SceneResult<()>;

    /// Rotation in radians
    fn rotation(&self, id: ElementId) -> SceneResult<f32>;
    fn set_rotation(&mut self, id: ElementId, radians: f32) -> SceneResult<()>;

    /// The element's layer, `None` while detached
    fn parent(&self, id: ElementId) -> SceneResult<Option<LayerId>>;

    /// Number of elements stacked in `layer`
    fn layer_len(&self, layer: LayerId) -> SceneResult<usize>;

    fn z_index(&self, id: ElementId) -> SceneResult<usize>;

    /// Moves the element to `index` within its current layer
    fn set_z_index(&mut self, id: ElementId, index: usize) -> SceneResult<()>;

    /// Inserts a detached element into `layer` at `index`, or on top when `None`.
    /// Returns the index it landed on.
    fn attach(&mut self, id: ElementId, layer: LayerId, index: Option<usize>) -> SceneResult<usize>;

    /// Removes the element from its layer, keeping it alive for a later `attach`
    fn detach(&mut self, id: ElementId) -> SceneResult<Placement>;

    fn property(&self, id: ElementId, name: &str) -> SceneResult<PropertyValue>;
    fn set_property(&mut self, id: ElementId, name: &str, value: PropertyValue) -> SceneResult<()>;

    /// Current placement of an attached element
    fn placement(&self, id: ElementId) -> SceneResult<Placement> {
        let layer = self.parent(id)?.ok_or(SceneError::Detached(id))?;
        Ok(Placement {
            layer,
            index: self.z_index(id)?,
        })
    }

    /// Applies a reorder primitive and returns the resulting z index
    fn reorder(&mut self, id: ElementId, order: ZOrder) -> SceneResult<usize> {
        let placement = self.placement(id)?;
        let len = self.layer_len(placement.layer)?;
        let target = order.resolve(placement.index, len);
        if target != placement.index {
            self.set_z_index(id, target)?;
        }
        self.z_index(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_clamps_within_layer() {
        assert_eq!(ZOrder::BringToFront.resolve(0, 4), 3);
        assert_eq!(ZOrder::SendToBack.resolve(3, 4), 0);
        assert_eq!(ZOrder::BringForward.resolve(3, 4), 3);
        assert_eq!(ZOrder::SendBackward.resolve(0, 4), 0);
        assert_eq!(ZOrder::BringForward.resolve(1, 4), 2);
        assert_eq!(ZOrder::To(99).resolve(1, 4), 3);
    }
}
