//! Reactive index maintenance.
//!
//! Storage changes reach the [`IndexingPipeline`], which turns them into
//! [`IndexJob`]s on a [`TaskQueue`]. Queues run jobs through an [`Indexer`],
//! which reads entities from the store and writes documents to the search
//! backend.

pub mod indexer;
pub mod job;
pub mod pipeline;
pub mod queue;

pub use self::indexer::Indexer;
pub use self::job::{Exclusion, IndexJob};
pub use self::pipeline::IndexingPipeline;
pub use self::queue::{ChannelTaskQueue, InlineTaskQueue, QueueStats, RecordingTaskQueue, TaskQueue};
