//! Configuration for the unidentified-delivery manager and service.

use std::time::Duration;

use shroud_crypto::Deployment;

/// Certificates must stay valid this long past "now" to be handed out.
pub const DEFAULT_CERTIFICATE_EXPIRY_MARGIN: Duration = Duration::from_secs(60 * 60);

/// Pending commands the service queue holds before callers wait.
pub const DEFAULT_COMMAND_QUEUE_DEPTH: usize = 64;

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdConfig {
    /// Deployment selecting the trust root and certificate slot
    pub deployment: Deployment,
    /// Validation horizon added to the current time
    pub expiry_margin: Duration,
    /// Server certificate key ids to reject
    pub revoked_server_key_ids: Vec<u32>,
    /// Bound on the service command queue
    pub command_queue_depth: usize,
}

impl Default for UdConfig {
    fn default() -> Self {
        Self {
            deployment: Deployment::Production,
            expiry_margin: DEFAULT_CERTIFICATE_EXPIRY_MARGIN,
            revoked_server_key_ids: Vec::new(),
            command_queue_depth: DEFAULT_COMMAND_QUEUE_DEPTH,
        }
    }
}

impl UdConfig {
    /// Default configuration for `deployment`.
    pub fn for_deployment(deployment: Deployment) -> Self {
        Self { deployment, ..Self::default() }
    }

    pub(crate) fn expiry_margin_ms(&self) -> u64 {
        self.expiry_margin.as_millis() as u64
    }
}
