use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonically allocated 64-bit entity identifier. `0` is the invalid sentinel;
/// it is never handed out by [`IdAllocator::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub u64);

impl Id {
    pub const INVALID: Id = Id(0);

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::INVALID
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out unique [`Id`] values starting at 1. Serialized as part of `State` so
/// allocation resumes correctly after a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdAllocator(u64);

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        IdAllocator(1)
    }

    pub fn next(&mut self) -> Id {
        let id = Id(self.0);
        self.0 += 1;
        id
    }

    /// Ensures subsequent allocations never collide with `seen`, used after
    /// merging content that carries its own ids (e.g. scenario import).
    pub fn observe(&mut self, seen: Id) {
        if seen.0 >= self.0 {
            self.0 = seen.0 + 1;
        }
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_starts_above_invalid_sentinel() {
        let mut alloc = IdAllocator::new();
        let first = alloc.next();
        assert!(first.is_valid());
        assert_ne!(first, Id::INVALID);
    }

    #[test]
    fn allocator_never_repeats() {
        let mut alloc = IdAllocator::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(alloc.next()));
        }
    }

    #[test]
    fn observe_advances_past_imported_ids() {
        let mut alloc = IdAllocator::new();
        alloc.observe(Id(500));
        assert_eq!(alloc.next(), Id(501));
    }
}
