use std::collections::BTreeMap;
use std::fmt;

use egui::{Color32, Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::layer::LayerId;

/// Smallest width or height an element may be resized to
pub const MIN_ELEMENT_SIZE: f32 = 2.0;

/// Stable identity of an element, preserved across detach/reattach cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(Uuid);

impl ElementId {
    /// Create a new random element ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value of a named element property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Color(Color32),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Color32> for PropertyValue {
    fn from(value: Color32) -> Self {
        PropertyValue::Color(value)
    }
}

/// Position, size and scale of an element, captured together by resize commands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Top-left corner
    pub position: Pos2,
    /// Unscaled size
    pub size: Vec2,
    /// Scale factor (1.0 = original size)
    pub scale: Vec2,
}

impl Bounds {
    /// Bounds at `position` with the given size and unit scale
    pub fn new(position: Pos2, size: Vec2) -> Self {
        Self {
            position,
            size,
            scale: Vec2::new(1.0, 1.0),
        }
    }

    /// Replace the scale
    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    /// The on-canvas rectangle these bounds cover
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position, self.size * self.scale)
    }
}

/// An editable object in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    id: ElementId,
    /// Display name shown in layer panels
    pub name: String,
    pub position: Pos2,
    pub size: Vec2,
    pub scale: Vec2,
    /// Rotation in radians
    pub rotation: f32,
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(skip)]
    pub(crate) parent: Option<LayerId>,
}

impl Element {
    /// Creates a detached element with unit scale and no rotation
    pub fn new(name: impl Into<String>, position: Pos2, size: Vec2) -> Self {
        Self {
            id: ElementId::new(),
            name: name.into(),
            position,
            size,
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
            properties: BTreeMap::new(),
            parent: None,
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// The layer this element is attached to, if any
    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            position: self.position,
            size: self.size,
            scale: self.scale,
        }
    }

    pub fn rect(&self) -> Rect {
        self.bounds().rect()
    }
}

/// Validates that a size has minimum dimensions
pub(crate) fn validate_size(size: Vec2) -> Result<(), String> {
    if size.x < MIN_ELEMENT_SIZE || size.y < MIN_ELEMENT_SIZE {
        Err(format!(
            "Element dimensions too small (min: {}). Width: {}, Height: {}",
            MIN_ELEMENT_SIZE, size.x, size.y
        ))
    } else {
        Ok(())
    }
}
