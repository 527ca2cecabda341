use std::sync::Arc;

use futures::Stream;

use relaypipe_broker::{require_configured, BrokerError};
use relaypipe_runtime::{Pipeline as RuntimePipeline, SequenceError, TransformError, TransformOutput};

use crate::broker::{ensure_global_broker, global_broker};
use crate::config::PipelineDefaults;

/// The user-facing pipeline: the same lifecycle as
/// [`relaypipe_runtime::Pipeline`], plus two things the bare runtime type
/// can't know about on its own — the `[pipeline]` defaults a stage falls back
/// to when a caller passes `None`, and (for a named pipeline) registration
/// with the process-wide broker on `start()`.
pub struct Pipeline<T: Send + 'static> {
    inner: RuntimePipeline<T>,
    defaults: PipelineDefaults,
}

impl<T: Send + 'static> Pipeline<T> {
    /// `max_size <= 0` means every inter-stage queue is unbounded. `name`
    /// makes the pipeline addressable through the broker once started.
    pub fn new(name: Option<impl Into<String>>, max_size: isize) -> Self {
        Self {
            inner: RuntimePipeline::new(name, max_size),
            defaults: PipelineDefaults::default(),
        }
    }

    pub fn unnamed() -> Self {
        Self::new(None::<String>, -1)
    }

    /// Builds a pipeline whose unstated stage knobs (`num`, `chunk_size`) and
    /// queue bound fall back to `defaults` instead of the runtime's
    /// hardcoded host-CPU-count/1 fallbacks.
    pub fn with_config(name: Option<impl Into<String>>, defaults: PipelineDefaults) -> Self {
        Self {
            inner: RuntimePipeline::new(name, defaults.max_size),
            defaults,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name()
    }

    pub fn add_origin<F>(
        &mut self,
        name: impl Into<String>,
        transform: F,
        num: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Result<(), SequenceError>
    where
        F: Fn(T) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
    {
        self.inner.add_origin(
            name,
            transform,
            self.defaults.resolved_workers(num),
            self.defaults.resolved_chunk_size(chunk_size),
        )
    }

    pub fn add_task<F>(
        &mut self,
        name: impl Into<String>,
        transform: F,
        num: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Result<(), SequenceError>
    where
        F: Fn(T) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
    {
        self.inner.add_task(
            name,
            transform,
            self.defaults.resolved_workers(num),
            self.defaults.resolved_chunk_size(chunk_size),
        )
    }

    pub fn add_destination<F>(
        &mut self,
        name: impl Into<String>,
        transform: F,
        num: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Result<(), SequenceError>
    where
        F: Fn(T) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
    {
        self.inner.add_destination(
            name,
            transform,
            self.defaults.resolved_workers(num),
            self.defaults.resolved_chunk_size(chunk_size),
        )
    }

    pub fn add_origin_with_state<P, F, S, D>(
        &mut self,
        name: impl Into<String>,
        transform: F,
        setup: S,
        teardown: D,
        num: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Result<(), SequenceError>
    where
        P: Send + 'static,
        F: Fn(T, Option<&P>) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
        S: Fn() -> Option<P> + Send + Sync + 'static,
        D: Fn(Option<P>) + Send + Sync + 'static,
    {
        self.inner.add_origin_with_state(
            name,
            transform,
            setup,
            teardown,
            self.defaults.resolved_workers(num),
            self.defaults.resolved_chunk_size(chunk_size),
        )
    }

    pub fn add_task_with_state<P, F, S, D>(
        &mut self,
        name: impl Into<String>,
        transform: F,
        setup: S,
        teardown: D,
        num: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Result<(), SequenceError>
    where
        P: Send + 'static,
        F: Fn(T, Option<&P>) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
        S: Fn() -> Option<P> + Send + Sync + 'static,
        D: Fn(Option<P>) + Send + Sync + 'static,
    {
        self.inner.add_task_with_state(
            name,
            transform,
            setup,
            teardown,
            self.defaults.resolved_workers(num),
            self.defaults.resolved_chunk_size(chunk_size),
        )
    }

    pub fn add_destination_with_state<P, F, S, D>(
        &mut self,
        name: impl Into<String>,
        transform: F,
        setup: S,
        teardown: D,
        num: Option<usize>,
        chunk_size: Option<usize>,
    ) -> Result<(), SequenceError>
    where
        P: Send + 'static,
        F: Fn(T, Option<&P>) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
        S: Fn() -> Option<P> + Send + Sync + 'static,
        D: Fn(Option<P>) + Send + Sync + 'static,
    {
        self.inner.add_destination_with_state(
            name,
            transform,
            setup,
            teardown,
            self.defaults.resolved_workers(num),
            self.defaults.resolved_chunk_size(chunk_size),
        )
    }

    /// Spawns every declared stage's workers. If this pipeline was given a
    /// name, also registers its head queue with the process-wide broker,
    /// lazily standing that broker up on the very first such registration.
    pub fn start(&mut self) -> Result<(), SequenceError> {
        self.inner.start()?;
        if let Some(name) = self.inner.name() {
            let head = self.inner.head_queue()?;
            ensure_global_broker().register_pipeline_queue(name.to_string(), &head);
        }
        Ok(())
    }

    pub async fn feed_chunk(&self, chunk: Vec<T>) -> Result<(), SequenceError> {
        self.inner.feed_chunk(chunk).await
    }

    pub async fn feed(&self, item: T) -> Result<(), SequenceError> {
        self.inner.feed(item).await
    }

    pub async fn join(&mut self) -> Result<(), SequenceError> {
        self.inner.join().await
    }

    pub fn as_completed(&mut self) -> Result<impl Stream<Item = T>, SequenceError> {
        self.inner.as_completed()
    }

    /// Routes `obj` to the pipeline registered under `dest`, through the
    /// process-wide broker. Fails with [`BrokerError::Unconfigured`] if no
    /// named pipeline has ever been started to bring that broker up.
    pub fn send(dest: impl Into<String>, obj: T) -> Result<(), BrokerError> {
        let center = require_configured(global_broker())?;
        center.send_message(dest, obj);
        Ok(())
    }

    /// `send` for each item of `objs`, in order.
    pub fn send_multiple(dest: impl Into<String>, objs: Vec<T>) -> Result<(), BrokerError> {
        let center = require_configured(global_broker())?;
        center.send_multiple(dest, objs);
        Ok(())
    }
}

/// Blocks until every broker event enqueued before this call — across every
/// named pipeline in the process — has been dispatched. A no-op if no named
/// pipeline has ever registered.
pub async fn flush() {
    if let Some(center) = global_broker() {
        center.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn one(v: i64) -> Result<TransformOutput<i64>, TransformError> {
        Ok(TransformOutput::One(v))
    }

    #[tokio::test]
    async fn defaults_fill_in_unspecified_chunk_size_and_workers() {
        let defaults = PipelineDefaults {
            chunk_size: 5,
            workers: Some(2),
            ..PipelineDefaults::default()
        };
        let mut pipe: Pipeline<i64> = Pipeline::with_config(None::<String>, defaults);
        pipe.add_task("double", |v| one(v * 2), None, None).unwrap();
        pipe.start().unwrap();
        for v in 0..3 {
            pipe.feed(v).await.unwrap();
        }
        pipe.join().await.unwrap();
        let mut out: Vec<i64> = pipe.as_completed().unwrap().collect().await;
        out.sort_unstable();
        assert_eq!(out, vec![0, 2, 4]);
    }

    #[test]
    fn sending_before_any_named_pipeline_exists_is_a_configuration_error() {
        // This crate's global broker is process-wide (see `broker.rs`) and
        // nothing in this module's other tests ever starts a *named*
        // pipeline, so it's still unset here. The positive case — routing
        // once a named pipeline exists — is exercised in `tests/messaging.rs`.
        assert_eq!(
            Pipeline::<i64>::send("nobody-registered-yet", 1),
            Err(BrokerError::Unconfigured)
        );
    }
}
