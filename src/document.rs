use std::collections::HashMap;

use egui::{Pos2, Vec2};

use crate::element::{self, Element, ElementId, PropertyValue};
use crate::error::{SceneError, SceneResult};
use crate::layer::{Layer, LayerId};
use crate::scene::{Placement, Scene};

/// In-memory scene: an arena of elements plus an ordered list of layers.
///
/// Detached elements stay in the arena so their identity survives
/// delete/recreate cycles.
#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: HashMap<ElementId, Element>,
    layers: Vec<Layer>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty layer on top of the others
    pub fn add_layer(&mut self, name: &str) -> LayerId {
        let layer = Layer::new(name);
        let id = layer.id;
        self.layers.push(layer);
        id
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Stores an element without attaching it to any layer
    pub fn insert_element(&mut self, mut element: Element) -> ElementId {
        let id = element.id();
        element.parent = None;
        self.elements.insert(id, element);
        id
    }

    /// Stores an element and stacks it on top of `layer`
    pub fn add_element(&mut self, layer: LayerId, element: Element) -> SceneResult<ElementId> {
        if self.layer(layer).is_none() {
            return Err(SceneError::LayerNotFound(layer));
        }
        let id = self.insert_element(element);
        self.attach(id, layer, None)?;
        Ok(id)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Elements of `layer` in z order, bottom first
    pub fn children(&self, layer: LayerId) -> SceneResult<&[ElementId]> {
        Ok(self.get_layer(layer)?.children())
    }

    fn get(&self, id: ElementId) -> SceneResult<&Element> {
        self.elements.get(&id).ok_or(SceneError::ElementNotFound(id))
    }

    fn get_mut(&mut self, id: ElementId) -> SceneResult<&mut Element> {
        self.elements.get_mut(&id).ok_or(SceneError::ElementNotFound(id))
    }

    fn get_layer(&self, id: LayerId) -> SceneResult<&Layer> {
        self.layer(id).ok_or(SceneError::LayerNotFound(id))
    }

    fn get_layer_mut(&mut self, id: LayerId) -> SceneResult<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|layer| layer.id == id)
            .ok_or(SceneError::LayerNotFound(id))
    }

    fn parent_layer(&self, id: ElementId) -> SceneResult<LayerId> {
        self.get(id)?.parent.ok_or(SceneError::Detached(id))
    }
}

impl Scene for Document {
    fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    fn position(&self, id: ElementId) -> SceneResult<Pos2> {
        Ok(self.get(id)?.position)
    }

    fn set_position(&mut self, id: ElementId, position: Pos2) -> SceneResult<()> {
        self.get_mut(id)?.position = position;
        Ok(())
    }

    fn size(&self, id: ElementId) -> SceneResult<Vec2> {
        Ok(self.get(id)?.size)
    }

    fn set_size(&mut self, id: ElementId, size: Vec2) -> SceneResult<()> {
        element::validate_size(size).map_err(SceneError::InvalidSize)?;
        self.get_mut(id)?.size = size;
        Ok(())
    }

    fn scale(&self, id: ElementId) -> SceneResult<Vec2> {
        Ok(self.get(id)?.scale)
    }

    fn set_scale(&mut self, id: ElementId, scale: Vec2) -> SceneResult<()> {
        self.get_mut(id)?.scale = scale;
        Ok(())
    }

    fn rotation(&self, id: ElementId) -> SceneResult<f32> {
        Ok(self.get(id)?.rotation)
    }

    fn set_rotation(&mut self, id: ElementId, radians: f32) -> SceneResult<()> {
        self.get_mut(id)?.rotation = radians;
        Ok(())
    }

    fn parent(&self, id: ElementId) -> SceneResult<Option<LayerId>> {
        Ok(self.get(id)?.parent)
    }

    fn layer_len(&self, layer: LayerId) -> SceneResult<usize> {
        Ok(self.get_layer(layer)?.len())
    }

    fn z_index(&self, id: ElementId) -> SceneResult<usize> {
        let layer = self.parent_layer(id)?;
        self.get_layer(layer)?
            .index_of(id)
            .ok_or(SceneError::Detached(id))
    }

    fn set_z_index(&mut self, id: ElementId, index: usize) -> SceneResult<()> {
        let layer_id = self.parent_layer(id)?;
        let layer = self.get_layer_mut(layer_id)?;
        let len = layer.len();
        if index >= len {
            return Err(SceneError::IndexOutOfBounds { index, len });
        }
        layer.remove(id).ok_or(SceneError::Detached(id))?;
        layer.insert(id, index);
        Ok(())
    }

    fn attach(&mut self, id: ElementId, layer: LayerId, index: Option<usize>) -> SceneResult<usize> {
        if let Some(current) = self.get(id)?.parent {
            return Err(SceneError::AlreadyAttached { element: id, layer: current });
        }
        let target = self.get_layer_mut(layer)?;
        let len = target.len();
        let index = match index {
            Some(index) if index > len => return Err(SceneError::IndexOutOfBounds { index, len }),
            Some(index) => index,
            None => len,
        };
        let index = target.insert(id, index);
        self.get_mut(id)?.parent = Some(layer);
        Ok(index)
    }

    fn detach(&mut self, id: ElementId) -> SceneResult<Placement> {
        let layer = self.parent_layer(id)?;
        let index = self
            .get_layer_mut(layer)?
            .remove(id)
            .ok_or(SceneError::Detached(id))?;
        self.get_mut(id)?.parent = None;
        Ok(Placement { layer, index })
    }

    fn property(&self, id: ElementId, name: &str) -> SceneResult<PropertyValue> {
        self.get(id)?
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| SceneError::PropertyNotFound {
                element: id,
                property: name.to_owned(),
            })
    }

    fn set_property(&mut self, id: ElementId, name: &str, value: PropertyValue) -> SceneResult<()> {
        self.get_mut(id)?.properties.insert(name.to_owned(), value);
        Ok(())
    }
}
