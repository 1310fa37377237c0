//! Provider clients: the contract the replication layer calls, response
//! normalization, and the HTTP client for mem0-compatible memory services.

mod client;
mod http;
pub mod normalize;

pub use client::ProviderClient;
pub use http::HttpProviderClient;
