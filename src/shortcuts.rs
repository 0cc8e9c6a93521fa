//! Undo/redo keyboard bindings for egui hosts.
//!
//! `COMMAND` is Ctrl on Windows/Linux and Cmd on macOS.

use egui::{InputState, Key, KeyboardShortcut, Modifiers};

use crate::command::CommandManager;
use crate::scene::Scene;

pub const UNDO_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::Z);
pub const REDO_SHORTCUT: KeyboardShortcut = KeyboardShortcut::new(Modifiers::COMMAND, Key::Y);
pub const REDO_SHIFT_SHORTCUT: KeyboardShortcut =
    KeyboardShortcut::new(Modifiers::COMMAND.plus(Modifiers::SHIFT), Key::Z);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryShortcut {
    Undo,
    Redo,
}

/// Consume the first pending undo/redo key press, if any.
pub fn consume_shortcut(input: &mut InputState) -> Option<HistoryShortcut> {
    // Shift+Z must be checked first: the plain binding ignores extra shift
    if input.consume_shortcut(&REDO_SHIFT_SHORTCUT) || input.consume_shortcut(&REDO_SHORTCUT) {
        Some(HistoryShortcut::Redo)
    } else if input.consume_shortcut(&UNDO_SHORTCUT) {
        Some(HistoryShortcut::Undo)
    } else {
        None
    }
}

/// Apply a pressed undo/redo shortcut to `manager`.
///
/// Does nothing while a widget has keyboard focus, so text fields keep
/// their own undo.
pub fn handle_shortcuts(
    ctx: &egui::Context,
    manager: &CommandManager,
    scene: &mut dyn Scene,
) -> Option<HistoryShortcut> {
    if ctx.wants_keyboard_input() {
        return None;
    }
    let shortcut = ctx.input_mut(consume_shortcut)?;
    let result = match shortcut {
        HistoryShortcut::Undo => manager.undo(scene),
        HistoryShortcut::Redo => manager.redo(scene),
    };
    if let Err(err) = result {
        log::debug!("{:?} shortcut ignored: {}", shortcut, err);
    }
    Some(shortcut)
}
