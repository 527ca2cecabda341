//! Shared primitives used by both the pipeline runtime and the messaging broker:
//! the end-of-stream [`Signal`], a process-unique token generator, and the
//! signal-gated verbose debug switch.

pub mod debug_gate;
pub mod ident;
pub mod sentinel;

pub use ident::random_token;
pub use sentinel::{Sentinel, Signal};
