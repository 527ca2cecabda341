//! Process-wide named delivery between pipelines: a single dispatch task owns
//! a name→queue directory and forwards payloads addressed to a registered
//! name, with a synchronous [`MessagingCenter::flush`] barrier and
//! best-effort handling of sends to names that never registered or were
//! since forgotten.

mod center;
mod error;
mod event;
mod sink;

pub use center::{require_configured, MessagingCenter};
pub use error::BrokerError;
