use std::collections::VecDeque;

use super::model::DocumentSnapshot;

pub const MAX_HISTORY: usize = 50;

/// Whole-snapshot undo/redo. Callers push a checkpoint before they mutate.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo_stack: VecDeque<DocumentSnapshot>,
    redo_stack: Vec<DocumentSnapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new edit branch, so whatever could be redone is gone.
    pub fn push_checkpoint(&mut self, snapshot: DocumentSnapshot) {
        self.undo_stack.push_back(snapshot);
        while self.undo_stack.len() > MAX_HISTORY {
            self.undo_stack.pop_front();
        }
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, current: DocumentSnapshot) -> Option<DocumentSnapshot> {
        let previous = self.undo_stack.pop_back()?;
        self.redo_stack.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: DocumentSnapshot) -> Option<DocumentSnapshot> {
        let next = self.redo_stack.pop()?;
        self.undo_stack.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::{DocumentSnapshot, UuidIds};
    use crate::layout::mutation::{MutationEngine, NewBlock};

    #[test]
    fn undo_then_redo_restores_exact_snapshots() {
        let mut engine = MutationEngine::default();
        let mut history = History::new();

        let a = DocumentSnapshot::empty();
        let slide_id = a.slides[0].id.clone();
        history.push_checkpoint(a.clone());
        let b = engine.add_block(&a, &slide_id, NewBlock::of_kind("chart"));
        assert_ne!(a, b);

        let undone = history.undo(b.clone()).unwrap();
        assert_eq!(undone, a);
        let redone = history.redo(undone).unwrap();
        assert_eq!(redone, b);
    }

    #[test]
    fn empty_stacks_are_no_ops() {
        let mut history = History::new();
        let current = DocumentSnapshot::empty();
        assert!(history.undo(current.clone()).is_none());
        assert!(history.redo(current).is_none());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn new_checkpoint_discards_redo_branch() {
        let mut history = History::new();
        let a = DocumentSnapshot::empty_with(&mut UuidIds);
        let b = DocumentSnapshot::empty_with(&mut UuidIds);
        history.push_checkpoint(a.clone());
        history.undo(b.clone());
        assert!(history.can_redo());
        history.push_checkpoint(a);
        assert!(!history.can_redo());
    }

    #[test]
    fn stack_keeps_only_the_most_recent_checkpoints() {
        let mut history = History::new();
        let snapshots: Vec<_> = (0..MAX_HISTORY + 5)
            .map(|_| DocumentSnapshot::empty())
            .collect();
        for snapshot in &snapshots {
            history.push_checkpoint(snapshot.clone());
        }
        assert_eq!(history.undo_depth(), MAX_HISTORY);

        let mut current = DocumentSnapshot::empty();
        let mut oldest = None;
        while let Some(previous) = history.undo(current) {
            oldest = Some(previous.clone());
            current = previous;
        }
        assert_eq!(oldest.as_ref(), Some(&snapshots[5]));
    }
}
