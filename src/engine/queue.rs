use crate::scene::command::Command;
use std::collections::VecDeque;

/// FIFO of pending mutations. Filled from anywhere on the editor thread,
/// emptied in one piece by the tick.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    pub fn extend(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.pending.extend(commands);
    }

    /// Take the whole batch; commands pushed afterwards wait for the next drain.
    pub fn drain(&mut self) -> VecDeque<Command> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_submission_order_and_empties() {
        let mut queue = CommandQueue::new();
        queue.push(Command::remove("a"));
        queue.extend([Command::remove("b"), Command::split("c")]);
        let batch: Vec<Command> = queue.drain().into_iter().collect();
        assert_eq!(
            batch,
            vec![Command::remove("a"), Command::remove("b"), Command::split("c")]
        );
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }
}
