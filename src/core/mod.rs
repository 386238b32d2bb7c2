pub mod world;
pub mod config;
pub mod storage;
pub mod island;
pub mod scheduler;
pub mod body_link_table;
pub mod stack_allocator;

pub use self::world::{PhysicsWorld, StepStats};
pub use self::config::PhysicsSettings;
pub use self::storage::{BodyStorage, Storage};
pub use self::island::IslandBuilder;
pub use self::body_link_table::BodyLinkTable;
pub use self::stack_allocator::{ScratchBuffer, StackAllocator, StackMarker};
pub use self::scheduler::{IslandScheduler, SequentialScheduler};

#[cfg(feature = "parallel")]
pub use self::scheduler::parallel::ParallelScheduler;

/// A unique identifier for a constraint in the physics world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub(crate) u32);

impl ConstraintId {
    /// Returns the index of the constraint in the world
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}
