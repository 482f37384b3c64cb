/// Keys the editor reacts to. Hosts translate their platform key events
/// into these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Control,
    Meta,
    Shift,
    Character(char),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorAction {
    DeleteSelection,
    Undo,
    Redo,
}

/// Held modifiers plus the shortcut table.
#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl InputState {
    /// Track a key transition; a press that completes a shortcut returns its
    /// action.
    pub fn handle_key(&mut self, key: Key, pressed: bool) -> Option<EditorAction> {
        match key {
            Key::Control => self.ctrl = pressed,
            Key::Meta => self.meta = pressed,
            Key::Shift => self.shift = pressed,
            _ if pressed => return self.action_for(key),
            _ => {}
        }
        None
    }

    pub fn action_for(&self, key: Key) -> Option<EditorAction> {
        let command = self.ctrl || self.meta;
        match key {
            Key::Delete | Key::Backspace => Some(EditorAction::DeleteSelection),
            Key::Character(c) if command => match c.to_ascii_lowercase() {
                'z' if self.shift => Some(EditorAction::Redo),
                'z' => Some(EditorAction::Undo),
                'y' => Some(EditorAction::Redo),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_keys_need_no_modifier() {
        let mut input = InputState::default();
        assert_eq!(input.handle_key(Key::Delete, true), Some(EditorAction::DeleteSelection));
        assert_eq!(input.handle_key(Key::Backspace, true), Some(EditorAction::DeleteSelection));
        assert_eq!(input.handle_key(Key::Delete, false), None);
    }

    #[test]
    fn undo_redo_shortcuts() {
        let mut input = InputState::default();
        assert_eq!(input.handle_key(Key::Character('z'), true), None);

        input.handle_key(Key::Control, true);
        assert_eq!(input.handle_key(Key::Character('z'), true), Some(EditorAction::Undo));
        assert_eq!(input.handle_key(Key::Character('Y'), true), Some(EditorAction::Redo));
        input.handle_key(Key::Shift, true);
        assert_eq!(input.handle_key(Key::Character('Z'), true), Some(EditorAction::Redo));
        input.handle_key(Key::Shift, false);
        input.handle_key(Key::Control, false);

        input.handle_key(Key::Meta, true);
        assert_eq!(input.handle_key(Key::Character('z'), true), Some(EditorAction::Undo));
        assert_eq!(input.handle_key(Key::Character('x'), true), None);
    }
}
