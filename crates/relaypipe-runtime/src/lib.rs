//! The worker-pool pipeline itself: stage declarations, the chunked queues
//! between them, and the start/feed/join/as_completed lifecycle.

pub mod error;
pub mod pipeline;
pub mod queue;
pub mod stage;
mod worker;

pub use error::{SequenceError, TransformError};
pub use pipeline::{Pipeline, Role};
pub use queue::PipelineQueue;
pub use stage::{Stage, TransformOutput};
