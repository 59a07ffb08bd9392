//! Git repository glue used by the bootstrap commands.

pub mod client;

pub use client::{GitClient, TransferProgress};
