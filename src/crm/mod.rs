//! CRM domain: record types, the backend boundary, and the cached client.

mod cache;
pub mod client;
pub mod service;
pub mod types;
mod workflows;

pub use client::CrmClient;
pub use service::{CrmBackend, StubCrm};
