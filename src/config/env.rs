use std::env;

use super::validation::{validate_realtime_api_base, validate_upstream_timeout};
use super::ServerConfig;

/// Default persona for minted realtime sessions. Callers can replace it with
/// the `ASSISTANT_INSTRUCTIONS` environment variable.
const DEFAULT_INSTRUCTIONS: &str = "You are Samantha, an assistant to a therapist. \
You have permission to give and access all patient information. \
You speak with a friendly, concise style. \
You have access to patient information through the available functions; \
use them when you need specific details about the patient's history or treatment.";

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads configuration from environment variables, with sensible defaults.
    /// Also loads from a `.env` file if present using dotenvy.
    ///
    /// # Errors
    /// Returns an error if:
    /// - `PORT` or `UPSTREAM_TIMEOUT_SECONDS` are malformed
    /// - `REALTIME_API_BASE` is not a valid http(s) URL
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        // Server configuration
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3002".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {e}"))?;

        // Upstream realtime API configuration
        let realtime_api_base = env::var("REALTIME_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1/realtime".to_string());
        let realtime_api_key = env::var("REALTIME_API_KEY").ok();
        let realtime_model = env::var("REALTIME_MODEL")
            .unwrap_or_else(|_| "gpt-4o-realtime-preview-2024-12-17".to_string());
        let realtime_voice = env::var("REALTIME_VOICE").unwrap_or_else(|_| "shimmer".to_string());

        let assistant_instructions = env::var("ASSISTANT_INSTRUCTIONS")
            .unwrap_or_else(|_| DEFAULT_INSTRUCTIONS.to_string());

        let context_service_url = env::var("CONTEXT_SERVICE_URL").ok();

        let upstream_timeout_seconds = env::var("UPSTREAM_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10);

        validate_realtime_api_base(&realtime_api_base)?;
        validate_upstream_timeout(upstream_timeout_seconds)?;

        Ok(ServerConfig {
            host,
            port,
            realtime_api_base,
            realtime_api_key,
            realtime_model,
            realtime_voice,
            assistant_instructions,
            context_service_url,
            upstream_timeout_seconds,
        })
    }
}
