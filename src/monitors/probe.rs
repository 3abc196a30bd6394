//! Single HTTP probe against a target address
//!
//! A probe is one GET request bounded by a fixed timeout. There are no
//! retries: the next attempt happens when the target is due again.
//!
//! ## Classification
//!
//! - Transport failure (refused, timeout, DNS, TLS) → failure
//! - Status code in `[200, 400)` → success
//! - Any other status code → failure

use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

/// Upper bound for a single probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a single probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub success: bool,

    /// HTTP status code, if a response was received
    pub status_code: Option<u16>,

    /// Transport error description, if no response was received
    pub error: Option<String>,

    pub elapsed_ms: u64,
}

impl ProbeOutcome {
    /// Short diagnostic used in log lines
    pub fn diagnostic(&self) -> String {
        match (self.status_code, &self.error) {
            (Some(code), _) => format!("HTTP {code}"),
            (None, Some(error)) => error.clone(),
            (None, None) => "no response".to_string(),
        }
    }
}

/// Whether a response status counts as a successful probe
pub fn is_success_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

/// Performs probes with a shared HTTP client
///
/// Redirects are followed with reqwest's default policy; the final response
/// is classified.
#[derive(Debug, Clone)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    /// Prober with the fixed 30 second timeout
    pub fn new() -> reqwest::Result<Self> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Probe `address` once
    #[instrument(skip(self))]
    pub async fn probe(&self, address: &str) -> ProbeOutcome {
        let start = Instant::now();
        let response = self.client.get(address).send().await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status_code = response.status().as_u16();
                let success = is_success_status(status_code);
                if success {
                    debug!("probe succeeded with status {status_code} in {elapsed_ms}ms");
                } else {
                    warn!("probe responded with status {status_code}");
                }

                ProbeOutcome {
                    success,
                    status_code: Some(status_code),
                    error: None,
                    elapsed_ms,
                }
            }
            Err(e) => {
                warn!("probe failed: {e}");
                ProbeOutcome {
                    success: false,
                    status_code: None,
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }
}
