//! Provider and server configuration (`~/.config/twinmem/config.toml` + environment).

mod env;
pub mod provider;
pub mod server;

pub use provider::{LlmProvider, ProviderConfig, mask_api_key};
pub use server::{ProviderMode, ProviderOverrides, ServerConfig, ServerSettings, Transport};
