//! Identifiers and simple allocators for skeleton entities.

use serde::{Deserialize, Serialize};

/// Stable joint identifier, assigned in depth-first order at skeleton build.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct JointId(pub u32);

impl JointId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Monotonic allocator for JointId.
/// Dense indices double as positions in the skeleton's joint table.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_joint: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_joint(&mut self) -> JointId {
        let id = JointId(self.next_joint);
        self.next_joint = self.next_joint.wrapping_add(1);
        id
    }
}
