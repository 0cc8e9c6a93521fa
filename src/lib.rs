#![warn(clippy::all, rust_2018_idioms)]

pub mod command;
pub mod config;
pub mod document;
pub mod element;
pub mod error;
pub mod id_generator;
pub mod layer;
pub mod scene;
pub mod shortcuts;
pub mod util;

pub use command::{Command, CommandError, CommandKind, CommandManager, CommandSnapshot, HistoryError, HistorySnapshot};
pub use config::{ConfigError, HistoryConfig};
pub use document::Document;
pub use element::{Bounds, Element, ElementId, PropertyValue};
pub use error::SceneError;
pub use layer::{Layer, LayerId};
pub use scene::{Placement, Scene, ZOrder};
