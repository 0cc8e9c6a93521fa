use thiserror::Error;

use crate::element::ElementId;
use crate::layer::LayerId;

/// Errors reported by a scene when a command touches its elements
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("Element {0} not found")]
    ElementNotFound(ElementId),

    #[error("Layer {0} not found")]
    LayerNotFound(LayerId),

    #[error("Element {0} is not attached to a layer")]
    Detached(ElementId),

    #[error("Element {element} is already attached to layer {layer}")]
    AlreadyAttached { element: ElementId, layer: LayerId },

    #[error("Element {element} has no property `{property}`")]
    PropertyNotFound { element: ElementId, property: String },

    #[error("Z index {index} out of bounds for layer of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid size: {0}")]
    InvalidSize(String),
}

/// Result type for scene operations
pub type SceneResult<T> = Result<T, SceneError>;
