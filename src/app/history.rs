//! Linear undo/redo log.
//!
//! Entries carry plain commands in both directions, so replaying one only
//! depends on how the processor applies commands, never on live runtime
//! state.

use crate::engine::SceneProject;
use crate::render::RenderSurface;
use crate::scene::command::Command;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("no scene is open")]
    NoScene,
    #[error("scene '{0}' has been disposed")]
    Disposed(String),
}

/// Where replayed commands go.
pub trait CommandSink {
    fn submit(&mut self, commands: &[Command]) -> Result<(), HistoryError>;
}

impl<S: RenderSurface> CommandSink for SceneProject<S> {
    fn submit(&mut self, commands: &[Command]) -> Result<(), HistoryError> {
        if self.is_disposed() {
            return Err(HistoryError::Disposed(self.id().to_string()));
        }
        for command in commands {
            self.enqueue(command.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub label: String,
    pub forward: Vec<Command>,
    pub inverse: Vec<Command>,
}

impl UndoEntry {
    pub fn new(label: impl Into<String>, forward: Vec<Command>, inverse: Vec<Command>) -> Self {
        Self {
            label: label.into(),
            forward,
            inverse,
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    undo: Vec<UndoEntry>,
    redo: Vec<UndoEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a fresh user action. Anything undone before is gone.
    pub fn record(&mut self, entry: UndoEntry) {
        log::debug!("History: recorded '{}'", entry.label);
        self.undo.push(entry);
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo.last().map(|entry| entry.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|entry| entry.label.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Replay the newest entry's inverse. A replay that cannot be submitted
    /// is logged and the entry is dropped from both stacks.
    pub fn undo(&mut self, sink: &mut impl CommandSink) -> bool {
        let Some(entry) = self.undo.pop() else {
            return false;
        };
        match sink.submit(&entry.inverse) {
            Ok(()) => {
                log::debug!("History: undo '{}'", entry.label);
                self.redo.push(entry);
                true
            }
            Err(err) => {
                log::error!("Undo of '{}' failed: {}", entry.label, err);
                false
            }
        }
    }

    pub fn redo(&mut self, sink: &mut impl CommandSink) -> bool {
        let Some(entry) = self.redo.pop() else {
            return false;
        };
        match sink.submit(&entry.forward) {
            Ok(()) => {
                log::debug!("History: redo '{}'", entry.label);
                self.undo.push(entry);
                true
            }
            Err(err) => {
                log::error!("Redo of '{}' failed: {}", entry.label, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        submitted: Vec<Command>,
        closed: bool,
    }

    impl CommandSink for Recorder {
        fn submit(&mut self, commands: &[Command]) -> Result<(), HistoryError> {
            if self.closed {
                return Err(HistoryError::NoScene);
            }
            self.submitted.extend_from_slice(commands);
            Ok(())
        }
    }

    fn entry(id: &str) -> UndoEntry {
        UndoEntry::new(
            format!("remove {}", id),
            vec![Command::remove(id)],
            vec![Command::split(id)],
        )
    }

    #[test]
    fn undo_and_redo_move_entries_between_stacks() {
        let mut history = History::new();
        let mut sink = Recorder::default();
        history.record(entry("a"));
        history.record(entry("b"));

        assert!(history.undo(&mut sink));
        assert_eq!(sink.submitted, vec![Command::split("b")]);
        assert_eq!(history.redo_label(), Some("remove b"));

        assert!(history.redo(&mut sink));
        assert_eq!(sink.submitted.last(), Some(&Command::remove("b")));
        assert_eq!(history.undo_len(), 2);
        assert!(!history.can_redo());
    }

    #[test]
    fn new_action_clears_redo() {
        let mut history = History::new();
        let mut sink = Recorder::default();
        history.record(entry("a"));
        history.undo(&mut sink);
        assert!(history.can_redo());
        history.record(entry("b"));
        assert!(!history.can_redo());
        assert!(!history.redo(&mut sink));
    }

    #[test]
    fn failed_replay_drops_the_entry() {
        let mut history = History::new();
        let mut sink = Recorder {
            closed: true,
            ..Recorder::default()
        };
        history.record(entry("a"));
        assert!(!history.undo(&mut sink));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn empty_history_is_a_noop() {
        let mut history = History::new();
        let mut sink = Recorder::default();
        assert!(!history.undo(&mut sink));
        assert!(!history.redo(&mut sink));
        assert!(sink.submitted.is_empty());
    }

    #[test]
    fn entries_serialize_as_commands() {
        let value = serde_json::to_value(entry("a")).unwrap();
        assert_eq!(value["forward"][0]["type"], "removeMesh");
        assert_eq!(value["inverse"][0]["payload"]["id"], "a");
    }
}
