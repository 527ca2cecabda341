use std::sync::OnceLock;

use relaypipe_broker::MessagingCenter;

/// The process-wide broker, lazily created the first time a named pipeline
/// registers with it. `Pipeline::send`/`send_multiple` see `None` here until
/// that happens and fail with [`relaypipe_broker::BrokerError::Unconfigured`]
/// rather than silently standing up a broker nobody asked for.
static BROKER: OnceLock<MessagingCenter> = OnceLock::new();

pub(crate) fn global_broker() -> Option<&'static MessagingCenter> {
    BROKER.get()
}

pub(crate) fn ensure_global_broker() -> &'static MessagingCenter {
    BROKER.get_or_init(MessagingCenter::new)
}
