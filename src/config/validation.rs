use url::Url;

/// Validate that the upstream realtime API base is a usable http(s) URL.
pub(super) fn validate_realtime_api_base(base: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(base).map_err(|e| format!("Invalid REALTIME_API_BASE '{base}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("REALTIME_API_BASE must be http or https, got '{other}'").into()),
    }
}

/// Upstream requests must have a non-zero timeout; a zero timeout would make
/// every mint fail immediately.
pub(super) fn validate_upstream_timeout(seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    if seconds == 0 {
        return Err("UPSTREAM_TIMEOUT_SECONDS must be greater than 0".into());
    }
    Ok(())
}
