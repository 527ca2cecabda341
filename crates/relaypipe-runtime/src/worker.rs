use std::sync::{Arc, Weak};

use relaypipe_core::Signal;

use crate::queue::PipelineQueue;
use crate::stage::{Stage, TransformOutput};

/// Runs one worker of a stage until it sees its sentinel, its input queue is
/// dropped out from under it, or its transform fails.
///
/// Output accumulates in `outgoing` and is flushed once it reaches the
/// stage's chunk size; `chunk_size` is an upper bound, not an exact size, so
/// whatever is left over when the sentinel arrives is flushed as one final
/// short chunk before teardown runs.
pub(crate) async fn run_worker<T: Send + 'static>(
    stage: Arc<dyn Stage<T>>,
    input: Weak<PipelineQueue<T>>,
    output: Weak<PipelineQueue<T>>,
    ordinal: usize,
) {
    let persistent = stage.setup();
    let chunk_size = stage.chunk_size();
    let mut outgoing: Vec<T> = Vec::with_capacity(chunk_size);

    'outer: loop {
        let Some(in_q) = input.upgrade() else {
            tracing::debug!(stage = stage.name(), worker = ordinal, "input queue gone; exiting");
            return;
        };
        let signal = in_q.recv().await;
        drop(in_q);

        let chunk = match signal {
            Signal::Sentinel => break,
            Signal::Item(chunk) => chunk,
        };

        for item in chunk {
            match stage.call(item, persistent.as_deref()) {
                Ok(TransformOutput::None) => {}
                Ok(TransformOutput::One(value)) => {
                    outgoing.push(value);
                    if outgoing.len() >= chunk_size
                        && !flush(&output, &mut outgoing, &stage, ordinal).await
                    {
                        break 'outer;
                    }
                }
                Ok(TransformOutput::Many(values)) => {
                    for value in values {
                        outgoing.push(value);
                        if outgoing.len() >= chunk_size
                            && !flush(&output, &mut outgoing, &stage, ordinal).await
                        {
                            break 'outer;
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(
                        stage = stage.name(),
                        worker = ordinal,
                        error = %err,
                        "transform failed; worker terminating without a trailing flush"
                    );
                    return;
                }
            }
        }
    }

    if !outgoing.is_empty() {
        if let Some(out_q) = output.upgrade() {
            out_q.push_chunk(outgoing).await;
        }
    }
    stage.teardown(persistent);
}

async fn flush<T: Send + 'static>(
    output: &Weak<PipelineQueue<T>>,
    outgoing: &mut Vec<T>,
    stage: &Arc<dyn Stage<T>>,
    ordinal: usize,
) -> bool {
    match output.upgrade() {
        Some(out_q) => {
            out_q.push_chunk(std::mem::take(outgoing)).await;
            true
        }
        None => {
            tracing::debug!(stage = stage.name(), worker = ordinal, "output queue gone; exiting");
            false
        }
    }
}
