/*!
 * OS Query Service
 * Narrow interface to the host's device inventory and property store
 */

pub mod powershell;

use async_trait::async_trait;

use crate::error::QueryError;

pub use powershell::PowerShellQuery;

/// Device property holding the battery percentage of a hands-free/audio accessory.
pub const BATTERY_PROPERTY_KEY: &str = "{104EA319-6EE2-4701-BD47-8DDBF425BBE5} 2";

/// Instance id prefix of classic Bluetooth devices.
pub const BLUETOOTH_INSTANCE_PREFIX: &str = "BTHENUM\\DEV_";

/// Token in an endpoint's status text that marks it as connected.
pub const CONNECTED_STATUS: &str = "OK";

/// An audio endpoint and its connectivity status as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEndpoint {
    pub name: String,
    pub status: String,
}

impl AudioEndpoint {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status.contains(CONNECTED_STATUS)
    }
}

/// Queries against the host OS. Every call is independent and
/// may be issued concurrently for different devices.
#[async_trait]
pub trait DeviceQuery: Send + Sync {
    /// Unique friendly names of paired Bluetooth devices.
    async fn bluetooth_device_names(&self) -> Result<Vec<String>, QueryError>;

    /// All audio endpoints with their status text.
    async fn audio_endpoints(&self) -> Result<Vec<AudioEndpoint>, QueryError>;

    /// Instance id of the first device whose friendly name contains `name`
    /// and which exposes [`BATTERY_PROPERTY_KEY`]. Empty if there is none.
    async fn resolve_instance_id(&self, name: &str) -> Result<String, QueryError>;

    /// Battery percentage stored under [`BATTERY_PROPERTY_KEY`] for `instance_id`.
    async fn battery_level(&self, instance_id: &str) -> Result<u8, QueryError>;
}

/// Trimmed, non-empty, de-duplicated lines in input order.
pub fn parse_name_list(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in output.lines().map(str::trim) {
        if !line.is_empty() && !names.iter().any(|name| name == line) {
            names.push(line.to_string());
        }
    }
    names
}

/// Parses `FriendlyName<TAB>Status` lines. Lines without a separator are
/// skipped.
pub fn parse_endpoint_lines(output: &str) -> Vec<AudioEndpoint> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.split_once('\t') {
            Some((name, status)) => Some(AudioEndpoint::new(name.trim(), status.trim())),
            None => {
                tracing::warn!("Skipping malformed audio endpoint line: {:?}", line);
                None
            }
        })
        .collect()
}

/// First non-empty line, or an empty string when nothing matched.
pub fn parse_instance_id(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub fn parse_battery_level(output: &str) -> Result<u8, QueryError> {
    let text = output.trim();
    match text.parse::<u8>() {
        Ok(level) if level <= 100 => Ok(level),
        _ => Err(QueryError::Malformed(format!(
            "expected battery percentage, got {:?}",
            text
        ))),
    }
}
