//! Shared network plumbing: encrypted DNS resolution with a system-resolver
//! fallback, and a process-wide HTTP client with a bounded on-disk response
//! cache. Every outbound request in the application goes through
//! [`CachedClient`].

mod cache;
mod client;
mod resolver;

pub use cache::{DEFAULT_CACHE_CAPACITY, ResponseCache, Validators};
pub use client::{
    CachedClient, CachedRequest, FetchResponse, NetworkError, USER_AGENT_VALUE, shared_client,
};
pub use resolver::{DohResolver, ResolutionError};
