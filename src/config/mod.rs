//! Configuration module for the Echo voice server
//!
//! Configuration is read from environment variables (with `.env` support via
//! dotenvy). Values cover the local token service and the upstream realtime
//! API it mints sessions against.
//!
//! # Modules
//! - `env`: environment variable loading
//! - `validation`: configuration validation logic

mod env;
mod validation;

/// Server configuration
///
/// Contains everything needed to run the token service, including:
/// - Server settings (host, port)
/// - Upstream realtime API settings (base URL, key, model, voice)
/// - The assistant persona instructions baked into minted sessions
/// - Optional patient-context service used to enrich instructions
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Upstream realtime API
    pub realtime_api_base: String,
    pub realtime_api_key: Option<String>,
    pub realtime_model: String,
    pub realtime_voice: String,

    // Assistant persona included in every minted session
    pub assistant_instructions: String,

    // Optional collaborator that assembles patient context text
    pub context_service_url: Option<String>,

    // Outbound HTTP request timeout
    pub upstream_timeout_seconds: u64,
}

impl ServerConfig {
    /// The socket address string this server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
