// ABOUTME: Library root for reglist - a minimal container registry client.
// ABOUTME: The CLI binary is in main.rs.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;

pub use client::{Client, ClientConfig, ClientError, ErrorKind, TransportKind};
pub use registry::{Repositories, Tags};
