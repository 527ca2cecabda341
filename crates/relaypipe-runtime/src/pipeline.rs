use std::marker::PhantomData;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;

use relaypipe_core::Signal;

use crate::error::{SequenceError, TransformError};
use crate::queue::PipelineQueue;
use crate::stage::{resolve_chunk_size, resolve_worker_count, ClosureStage, Stage, TransformOutput};
use crate::worker::run_worker;

/// A multi-stage pipeline: one or more origins, zero or more middle tasks, and
/// one or more destinations, each backed by its own pool of workers and
/// joined by bounded (or unbounded) chunk queues.
///
/// Built via `add_origin`/`add_task`/`add_destination` while unstarted, then
/// `start()`ed into a running handle. Declaration order within a role doesn't
/// matter — origins always run first, then tasks in declaration order, then
/// destinations last — only the grouping does.
pub struct Pipeline<T: Send + 'static> {
    name: Option<String>,
    max_size: isize,
    origins: Vec<Box<dyn Stage<T>>>,
    middles: Vec<Box<dyn Stage<T>>>,
    destinations: Vec<Box<dyn Stage<T>>>,
    runtime: Option<Arc<RuntimeInner<T>>>,
}

struct RuntimeInner<T: Send + 'static> {
    queues: Vec<Arc<PipelineQueue<T>>>,
    stage_counts: Vec<usize>,
    handles: Mutex<Vec<Vec<JoinHandle<()>>>>,
    joined: OnceCell<()>,
}

impl<T: Send + 'static> RuntimeInner<T> {
    async fn ensure_joined(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.joined
            .get_or_init(move || async move {
                let mut handles = this.handles.lock().await;
                for (i, n_i) in this.stage_counts.iter().enumerate() {
                    for _ in 0..*n_i {
                        this.queues[i].push_sentinel().await;
                    }
                    for handle in handles[i].drain(..) {
                        let _ = handle.await;
                    }
                }
                this.queues.last().unwrap().push_sentinel().await;
            })
            .await;
    }
}

impl<T: Send + 'static> Pipeline<T> {
    /// `max_size <= 0` means every inter-stage queue is unbounded.
    pub fn new(name: Option<impl Into<String>>, max_size: isize) -> Self {
        Self {
            name: name.map(Into::into),
            max_size,
            origins: Vec::new(),
            middles: Vec::new(),
            destinations: Vec::new(),
            runtime: None,
        }
    }

    pub fn unnamed() -> Self {
        Self::new(None::<String>, -1)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn ensure_not_started(&self) -> Result<(), SequenceError> {
        if self.runtime.is_some() {
            Err(SequenceError::AlreadyStarted)
        } else {
            Ok(())
        }
    }

    pub fn add_stage(&mut self, role: Role, stage: Box<dyn Stage<T>>) -> Result<(), SequenceError> {
        self.ensure_not_started()?;
        match role {
            Role::Origin => self.origins.push(stage),
            Role::Task => self.middles.push(stage),
            Role::Destination => self.destinations.push(stage),
        }
        Ok(())
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
        self.add_stage(Role::Origin, stateless_stage(name, transform, num, chunk_size))
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
        self.add_stage(Role::Task, stateless_stage(name, transform, num, chunk_size))
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
        self.add_stage(Role::Destination, stateless_stage(name, transform, num, chunk_size))
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
        self.add_stage(Role::Origin, stateful_stage(name, transform, setup, teardown, num, chunk_size))
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
        self.add_stage(Role::Task, stateful_stage(name, transform, setup, teardown, num, chunk_size))
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
        self.add_stage(Role::Destination, stateful_stage(name, transform, setup, teardown, num, chunk_size))
    }

    /// Spawns every worker of every declared stage. Idempotent check only —
    /// calling this twice is a [`SequenceError::AlreadyStarted`].
    pub fn start(&mut self) -> Result<(), SequenceError> {
        self.ensure_not_started()?;

        let stages: Vec<Box<dyn Stage<T>>> = self
            .origins
            .drain(..)
            .chain(self.middles.drain(..))
            .chain(self.destinations.drain(..))
            .collect();

        let stage_count = stages.len();
        let mut queues = Vec::with_capacity(stage_count + 1);
        for _ in 0..=stage_count {
            queues.push(Arc::new(PipelineQueue::new(self.max_size)));
        }

        let mut stage_counts = Vec::with_capacity(stage_count);
        let mut handles = Vec::with_capacity(stage_count);
        for (i, stage) in stages.into_iter().enumerate() {
            let stage: Arc<dyn Stage<T>> = Arc::from(stage);
            let n_i = stage.worker_count();
            stage_counts.push(n_i);

            let input = Arc::downgrade(&queues[i]);
            let output = Arc::downgrade(&queues[i + 1]);
            let mut stage_handles = Vec::with_capacity(n_i);
            for ordinal in 0..n_i {
                stage_handles.push(tokio::spawn(run_worker(
                    Arc::clone(&stage),
                    input.clone(),
                    output.clone(),
                    ordinal,
                )));
            }
            handles.push(stage_handles);
        }

        self.runtime = Some(Arc::new(RuntimeInner {
            queues,
            stage_counts,
            handles: Mutex::new(handles),
            joined: OnceCell::new(),
        }));
        Ok(())
    }

    fn runtime(&self) -> Result<&Arc<RuntimeInner<T>>, SequenceError> {
        self.runtime.as_ref().ok_or(SequenceError::NotStarted)
    }

    /// The head queue, for an already-started pipeline that wants to register
    /// itself with a messaging broker as a named destination.
    pub fn head_queue(&self) -> Result<Arc<PipelineQueue<T>>, SequenceError> {
        Ok(Arc::clone(&self.runtime()?.queues[0]))
    }

    pub async fn feed_chunk(&self, chunk: Vec<T>) -> Result<(), SequenceError> {
        self.runtime()?.queues[0].push_chunk(chunk).await;
        Ok(())
    }

    pub async fn feed(&self, item: T) -> Result<(), SequenceError> {
        self.feed_chunk(vec![item]).await
    }

    /// Pushes one sentinel per worker onto each stage's input queue in turn,
    /// awaiting that stage's workers before moving to the next, then pushes a
    /// final sentinel onto the tail queue. Idempotent: a second call (explicit
    /// or from `as_completed`'s implicit background join) is a no-op.
    pub async fn join(&mut self) -> Result<(), SequenceError> {
        let runtime = Arc::clone(self.runtime()?);
        runtime.ensure_joined().await;
        Ok(())
    }

    /// A lazy stream of every item the pipeline ultimately produced. Starts a
    /// background join if one hasn't happened yet, so callers don't have to
    /// call `join()` themselves before draining results.
    pub fn as_completed(&mut self) -> Result<impl Stream<Item = T>, SequenceError> {
        let runtime = Arc::clone(self.runtime()?);
        let background = Arc::clone(&runtime);
        tokio::spawn(async move { background.ensure_joined().await });

        let tail = Arc::clone(runtime.queues.last().unwrap());
        Ok(futures::stream::unfold(
            (tail, Vec::<T>::new()),
            |(tail, mut buffered)| async move {
                loop {
                    if let Some(item) = buffered.pop() {
                        return Some((item, (tail, buffered)));
                    }
                    match tail.recv().await {
                        Signal::Sentinel => return None,
                        Signal::Item(chunk) => {
                            buffered = chunk;
                            buffered.reverse();
                        }
                    }
                }
            },
        ))
    }
}

impl<T: Send + 'static> Drop for Pipeline<T> {
    fn drop(&mut self) {
        if let Some(name) = &self.name {
            tracing::debug!(pipeline = name, "pipeline dropped");
        }
        // Queues are Arc-owned here and workers only hold Weak handles, so
        // dropping `runtime` (and its queues) is itself the cleanup: any
        // worker still waiting on `recv()` will find its queue gone next time
        // it tries to upgrade.
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Origin,
    Task,
    Destination,
}

fn stateless_stage<T, F>(
    name: impl Into<String>,
    transform: F,
    num: Option<usize>,
    chunk_size: Option<usize>,
) -> Box<dyn Stage<T>>
where
    T: Send + 'static,
    F: Fn(T) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
{
    Box::new(ClosureStage {
        label: name.into(),
        num: resolve_worker_count(num),
        chunk_size: resolve_chunk_size(chunk_size),
        transform: move |item: T, _p: Option<&()>| transform(item),
        setup_fn: || None::<()>,
        teardown_fn: |_: Option<()>| {},
        _marker: PhantomData,
    })
}

fn stateful_stage<T, P, F, S, D>(
    name: impl Into<String>,
    transform: F,
    setup: S,
    teardown: D,
    num: Option<usize>,
    chunk_size: Option<usize>,
) -> Box<dyn Stage<T>>
where
    T: Send + 'static,
    P: Send + 'static,
    F: Fn(T, Option<&P>) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
    S: Fn() -> Option<P> + Send + Sync + 'static,
    D: Fn(Option<P>) + Send + Sync + 'static,
{
    Box::new(ClosureStage {
        label: name.into(),
        num: resolve_worker_count(num),
        chunk_size: resolve_chunk_size(chunk_size),
        transform,
        setup_fn: setup,
        teardown_fn: teardown,
        _marker: PhantomData,
    })
}
