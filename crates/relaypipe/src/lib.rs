//! Multi-stage parallel data-processing pipelines with optional named
//! inter-pipeline routing.
//!
//! Declare an ordered sequence of stages, each backed by one or more
//! concurrent workers and a per-item transform; the library handles
//! fan-out/fan-in, chunk batching, worker lifecycle, ordered shutdown, and —
//! for pipelines given a name — cross-pipeline delivery through a
//! process-wide broker.
//!
//! ```
//! use relaypipe::{Pipeline, TransformOutput};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut pipe: Pipeline<i64> = Pipeline::unnamed();
//! pipe.add_task("incr", |v| Ok(TransformOutput::One(v + 1)), None, None).unwrap();
//! pipe.start().unwrap();
//! pipe.feed(41).await.unwrap();
//! pipe.join().await.unwrap();
//! # }
//! ```

mod broker;
mod config;
mod pipeline;

pub use config::{ConfigError, PipelineDefaults};
pub use pipeline::{flush, Pipeline};

pub use relaypipe_broker::{BrokerError, MessagingCenter};
pub use relaypipe_core::{random_token, Sentinel, Signal};
pub use relaypipe_runtime::{PipelineQueue, Role, SequenceError, TransformError, TransformOutput};
