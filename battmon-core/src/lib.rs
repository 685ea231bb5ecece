/*!
 * BATTMON Core
 * Bluetooth audio accessory status and battery monitoring
 */

mod auto_refresh;
pub mod bluetooth;
pub mod config;
pub mod device;
pub mod error;
pub mod query;

pub use bluetooth::{apply_endpoint_statuses, BluetoothManager, RefreshReport};
pub use config::{MonitorConfig, PowerShellConfig};
pub use device::{Device, DeviceCollection, DeviceState};
pub use error::{BluetoothError, DeviceError, QueryError, Result};
pub use query::{AudioEndpoint, DeviceQuery, PowerShellQuery};
