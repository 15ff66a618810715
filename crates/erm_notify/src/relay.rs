use erm_core::error::AppError;

#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: String,
    timeout: std::time::Duration,
}

impl RelayClient {
    /// Create a client for an HTTP message relay. Only `http://` and `https://` endpoints
    /// with a host are accepted; credentials embedded in the URL are refused.
    pub fn new(endpoint: &str, timeout_ms: u64) -> Result<Self, AppError> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();

        let rest = endpoint
            .strip_prefix("https://")
            .or_else(|| endpoint.strip_prefix("http://"));
        let Some(rest) = rest else {
            return Err(AppError::new(
                "NOTIFY_ENDPOINT_INVALID",
                "Relay endpoint must start with http:// or https://",
            )
            .with_details(format!("endpoint={endpoint}")));
        };

        let authority = rest.split('/').next().unwrap_or("");
        if authority.is_empty() || authority.contains('@') {
            return Err(AppError::new(
                "NOTIFY_ENDPOINT_INVALID",
                "Relay endpoint must name a host and carry no credentials",
            )
            .with_details(format!("endpoint={endpoint}")));
        }
        if let Some((_, port)) = authority.rsplit_once(':') {
            if !authority.ends_with(']') && !matches!(port.parse::<u16>(), Ok(p) if p > 0) {
                return Err(AppError::new(
                    "NOTIFY_ENDPOINT_INVALID",
                    "Relay endpoint has an invalid port",
                )
                .with_details(format!("endpoint={endpoint}")));
            }
        }

        if timeout_ms == 0 {
            return Err(AppError::new(
                "NOTIFY_TIMEOUT_INVALID",
                "Relay timeout must be positive",
            ));
        }

        Ok(Self {
            endpoint,
            timeout: std::time::Duration::from_millis(timeout_ms),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> std::time::Duration {
        self.timeout
    }
}
