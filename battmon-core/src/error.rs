use std::time::Duration;

use thiserror::Error;

/// Failure of a single call into the OS query service.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("query exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("malformed query output: {0}")]
    Malformed(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("battery level {0}% is out of range")]
    BatteryOutOfRange(u8),
}

#[derive(Debug, Error)]
pub enum BluetoothError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("{failed} refresh worker(s) panicked")]
    Worker { failed: usize },

    #[error("auto-refresh is already running")]
    AlreadyRunning,

    #[error("auto-refresh worker did not stop within {0:?}")]
    StopTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, BluetoothError>;
