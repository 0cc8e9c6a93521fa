use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::ElementId;

/// A unique identifier for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Creates a new random LayerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A container holding an ordered stack of elements.
///
/// Index 0 is the bottom of the stack; an element's z index is its position
/// in `children`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    /// Unique identifier for the layer
    pub id: LayerId,
    /// Display name of the layer
    pub name: String,
    children: Vec<ElementId>,
}

impl Layer {
    pub fn new(name: &str) -> Self {
        Self {
            id: LayerId::new(),
            name: name.to_string(),
            children: Vec::new(),
        }
    }

    /// Elements in z order, bottom first
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Z index of `element` within this layer
    pub fn index_of(&self, element: ElementId) -> Option<usize> {
        self.children.iter().position(|id| *id == element)
    }

    /// Inserts `element` at `index`, clamped to the top of the stack
    pub(crate) fn insert(&mut self, element: ElementId, index: usize) -> usize {
        let index = index.min(self.children.len());
        self.children.insert(index, element);
        index
    }

    /// Removes `element` and returns the index it occupied
    pub(crate) fn remove(&mut self, element: ElementId) -> Option<usize> {
        let index = self.index_of(element)?;
        self.children.remove(index);
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_clamps_to_top() {
        let mut layer = Layer::new("Layer 0");
        let a = ElementId::new();
        let b = ElementId::new();
        assert_eq!(layer.insert(a, 0), 0);
        assert_eq!(layer.insert(b, 10), 1);
        assert_eq!(layer.children(), &[a, b]);
    }

    #[test]
    fn test_remove_reports_index() {
        let mut layer = Layer::new("Layer 0");
        let ids: Vec<ElementId> = (0..3).map(|_| ElementId::new()).collect();
        for id in &ids {
            layer.insert(*id, usize::MAX);
        }
        assert_eq!(layer.remove(ids[1]), Some(1));
        assert_eq!(layer.remove(ids[1]), None);
        assert_eq!(layer.children(), &[ids[0], ids[2]]);
    }
}
