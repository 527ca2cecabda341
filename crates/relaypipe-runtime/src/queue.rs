use relaypipe_core::Signal;
use tokio::sync::{mpsc, Mutex};

/// The channel a stage reads its chunks from and writes its output chunks to.
///
/// `max_size <= 0` means unbounded, matching the original's `maxsize<=0` ==
/// infinite convention. A positive `max_size` applies backpressure: a full
/// downstream queue blocks its upstream workers on `push_chunk`.
///
/// Multiple workers within a stage hold an `Arc` to the same queue and race
/// each other for both ends — producers via `push_chunk`/`push_sentinel`
/// (`mpsc::Sender::send` takes `&self` and tolerates concurrent callers),
/// consumers via `recv`, which serializes access to the receiver half behind
/// a mutex so exactly one worker ever wins a given item.
pub struct PipelineQueue<T> {
    sender: RawSender<Signal<Vec<T>>>,
    receiver: Mutex<RawReceiver<Signal<Vec<T>>>>,
}

enum RawSender<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

enum RawReceiver<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

impl<T: Send + 'static> PipelineQueue<T> {
    pub fn new(max_size: isize) -> Self {
        if max_size > 0 {
            let (tx, rx) = mpsc::channel(max_size as usize);
            Self {
                sender: RawSender::Bounded(tx),
                receiver: Mutex::new(RawReceiver::Bounded(rx)),
            }
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                sender: RawSender::Unbounded(tx),
                receiver: Mutex::new(RawReceiver::Unbounded(rx)),
            }
        }
    }

    pub async fn push_chunk(&self, chunk: Vec<T>) {
        self.send(Signal::Item(chunk)).await;
    }

    pub async fn push_sentinel(&self) {
        self.send(Signal::Sentinel).await;
    }

    async fn send(&self, signal: Signal<Vec<T>>) {
        let result = match &self.sender {
            RawSender::Bounded(tx) => tx.send(signal).await.map_err(|_| ()),
            RawSender::Unbounded(tx) => tx.send(signal).map_err(|_| ()),
        };
        if result.is_err() {
            tracing::debug!("push onto a queue with no live receiver; dropping");
        }
    }

    /// Waits for the next chunk or sentinel. Returns `Signal::Sentinel` forever
    /// once the channel has been closed out from under this queue.
    pub async fn recv(&self) -> Signal<Vec<T>> {
        let mut guard = self.receiver.lock().await;
        let received = match &mut *guard {
            RawReceiver::Bounded(rx) => rx.recv().await,
            RawReceiver::Unbounded(rx) => rx.recv().await,
        };
        received.unwrap_or(Signal::Sentinel)
    }
}
