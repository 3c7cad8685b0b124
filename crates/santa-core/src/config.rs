use serde::{Deserialize, Serialize};

/// Client SDK configuration.
///
/// Constructed by the caller and handed to `SantaClient`; there is no
/// hidden global instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server origin, e.g. `https://santa.example.org`
    pub api_host: String,
    /// API path prefix appended to the host (default: /api/v1)
    pub api_base: String,
    /// HTTP request timeout in seconds (default: 30)
    pub request_timeout_secs: u64,
    /// PBKDF2-SHA256 iteration count for secret/password stretching.
    ///
    /// Deployments must keep this at 300_000 or above; the slowness is
    /// the security property, not an implementation cost. Tests may
    /// lower it.
    pub kdf_iterations: u32,
}

/// OWASP password-storage guidance for PBKDF2-SHA256.
pub const DEFAULT_KDF_ITERATIONS: u32 = 310_000;

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_host: "http://localhost:8080".into(),
            api_base: "/api/v1".into(),
            request_timeout_secs: 30,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl ClientConfig {
    pub fn new(api_host: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            ..Self::default()
        }
    }

    /// Full base URL for API requests.
    pub fn api_url(&self) -> String {
        format!(
            "{}{}",
            self.api_host.trim_end_matches('/'),
            self.api_base
        )
    }
}
