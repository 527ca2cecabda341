use thiserror::Error;

/// Raised for broker misuse that the caller should see, as opposed to routing
/// failures (`send` to an unknown/tombstoned name), which are logged and
/// dropped rather than surfaced — see [`crate::center::MessagingCenter::send_message`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerError {
    #[error("no named pipeline has ever been created; the broker is unconfigured")]
    Unconfigured,
}
