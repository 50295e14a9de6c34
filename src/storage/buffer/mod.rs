//! Buffer pool: caches file pages in a fixed number of in-memory frames
//! and picks the frames to reuse with the clock replacement policy.

pub mod bufferpool;
pub mod directory;
pub mod frame;
pub mod guard;
pub mod replacer;

pub use bufferpool::{BufferPoolManager, FrameStat};
pub use frame::FrameId;
pub use guard::PageGuard;
