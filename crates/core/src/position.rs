//! Current-stage pointer and its adjustment rules under structural edits.

/// Index of the stage the learner is on.
///
/// Holds `0 <= current_index < len` for a non-empty course and
/// `current_index == 0` for an empty one, provided `clamp` runs after every
/// structural change. Every mutator reports whether the index moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionTracker {
    current_index: usize,
}

impl PositionTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts at `index`, clamped to a course of `len` stages.
    #[must_use]
    pub fn at(index: usize, len: usize) -> Self {
        let mut tracker = Self {
            current_index: index,
        };
        tracker.clamp(len);
        tracker
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn clamp(&mut self, len: usize) -> bool {
        let clamped = self.current_index.min(len.saturating_sub(1));
        self.set(clamped)
    }

    /// Adjusts for the removal of the stage at `deleted_index`.
    pub fn on_delete(&mut self, deleted_index: usize) -> bool {
        if deleted_index <= self.current_index {
            self.set(self.current_index.saturating_sub(1))
        } else {
            false
        }
    }

    /// Keeps pointing at the same stage after it, or a neighbour, moved from
    /// `from_index` to `to_index`.
    pub fn on_reorder(&mut self, from_index: usize, to_index: usize) -> bool {
        let current = self.current_index;
        let next = if current == from_index {
            to_index
        } else if from_index < current && current <= to_index {
            current - 1
        } else if to_index <= current && current < from_index {
            current + 1
        } else {
            current
        };
        self.set(next)
    }

    /// Moves to the next stage; stays put on the last one.
    pub fn advance(&mut self, len: usize) -> bool {
        if self.current_index + 1 < len {
            self.set(self.current_index + 1)
        } else {
            false
        }
    }

    /// Moves to the previous stage; stays put on the first one.
    pub fn retreat(&mut self) -> bool {
        if self.current_index > 0 {
            self.set(self.current_index - 1)
        } else {
            false
        }
    }

    /// Jumps straight to `index`; ignored when out of range.
    pub fn jump_to(&mut self, index: usize, len: usize) -> bool {
        if index < len {
            self.set(index)
        } else {
            false
        }
    }

    fn set(&mut self, index: usize) -> bool {
        let changed = self.current_index != index;
        self.current_index = index;
        changed
    }
}
