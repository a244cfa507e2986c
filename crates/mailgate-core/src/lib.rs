//! Core types for the mailgate dispatcher.
//!
//! Everything the server needs to understand a "send" request lives here:
//! the message payload and its defaults, SMTP transport options with the
//! provider preset table, the duplicate-request gate, and decryption of the
//! credential stored encrypted in the host configuration.

pub mod crypto;
pub mod dedup;
pub mod message;
pub mod options;

pub use dedup::{DedupGate, DEDUP_WINDOW};
pub use message::{Defaults, Message};
pub use options::{normalize, Auth, TlsOptions, TransportOptions};
