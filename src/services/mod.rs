//! Services Module
//!
//! Configuration wiring and the HTTP resolver service.

pub mod bootstrap;
pub mod server;

pub use bootstrap::{chat_provider_from_config, embedder_from_config, load_resolver, ollama_client};
pub use server::{router, run_resolver_server, ResolverServerState};
