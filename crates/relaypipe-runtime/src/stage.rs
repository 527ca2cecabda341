use std::any::Any;
use std::marker::PhantomData;

use crate::error::TransformError;

/// What a single call into a transform produced.
///
/// `Many` covers the lazy-sequence case — the worker drains it item by item,
/// so a transform that wants to fan one input out into thousands of outputs
/// doesn't have to materialize them all at once.
pub enum TransformOutput<T> {
    None,
    One(T),
    Many(Box<dyn Iterator<Item = T> + Send>),
}

/// One stage of a pipeline: a transform, its worker count, its output chunk
/// size, and (optionally) per-worker persistent state threaded from `setup`
/// through every `call` to `teardown`.
///
/// Object-safe so a pipeline can hold a heterogeneous `Vec<Box<dyn Stage<T>>>`
/// even though each stage's persistent-state type differs; [`ClosureStage`]
/// erases that type behind `Any` internally so callers never see it.
pub trait Stage<T>: Send + Sync {
    fn name(&self) -> &str;
    fn worker_count(&self) -> usize;
    fn chunk_size(&self) -> usize;
    fn setup(&self) -> Option<Box<dyn Any + Send>>;
    fn call(
        &self,
        item: T,
        persistent: Option<&(dyn Any + Send)>,
    ) -> Result<TransformOutput<T>, TransformError>;
    fn teardown(&self, persistent: Option<Box<dyn Any + Send>>);
}

pub(crate) fn resolve_worker_count(num: Option<usize>) -> usize {
    match num {
        Some(n) if n >= 1 => n,
        _ => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

pub(crate) fn resolve_chunk_size(chunk_size: Option<usize>) -> usize {
    match chunk_size {
        Some(k) if k >= 1 => k,
        _ => 1,
    }
}

pub(crate) struct ClosureStage<T, P, F, S, D> {
    pub label: String,
    pub num: usize,
    pub chunk_size: usize,
    pub transform: F,
    pub setup_fn: S,
    pub teardown_fn: D,
    pub _marker: PhantomData<fn() -> (T, P)>,
}

impl<T, P, F, S, D> Stage<T> for ClosureStage<T, P, F, S, D>
where
    T: Send + 'static,
    P: Send + 'static,
    F: Fn(T, Option<&P>) -> Result<TransformOutput<T>, TransformError> + Send + Sync + 'static,
    S: Fn() -> Option<P> + Send + Sync + 'static,
    D: Fn(Option<P>) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.label
    }

    fn worker_count(&self) -> usize {
        self.num
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn setup(&self) -> Option<Box<dyn Any + Send>> {
        (self.setup_fn)().map(|p| Box::new(p) as Box<dyn Any + Send>)
    }

    fn call(
        &self,
        item: T,
        persistent: Option<&(dyn Any + Send)>,
    ) -> Result<TransformOutput<T>, TransformError> {
        let persistent = persistent.and_then(|p| p.downcast_ref::<P>());
        (self.transform)(item, persistent)
    }

    fn teardown(&self, persistent: Option<Box<dyn Any + Send>>) {
        let persistent = persistent.and_then(|p| p.downcast::<P>().ok()).map(|p| *p);
        (self.teardown_fn)(persistent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_worker_count_defaults_to_cpu_count() {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(resolve_worker_count(None), cpus);
        assert_eq!(resolve_worker_count(Some(0)), cpus);
        assert_eq!(resolve_worker_count(Some(4)), 4);
    }

    #[test]
    fn resolve_chunk_size_defaults_to_one() {
        assert_eq!(resolve_chunk_size(None), 1);
        assert_eq!(resolve_chunk_size(Some(0)), 1);
        assert_eq!(resolve_chunk_size(Some(9)), 9);
    }
}
