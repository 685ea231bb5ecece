/*!
 * Bluetooth Device Management
 * Connection status and battery refresh over the OS query service
 */

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Mutex as CycleLock, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::auto_refresh::AutoRefresh;
use crate::config::MonitorConfig;
use crate::device::{Device, DeviceCollection, DeviceState};
use crate::error::{BluetoothError, QueryError, Result};
use crate::query::{AudioEndpoint, DeviceQuery};

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// False when the endpoint listing failed and statuses were left as they were.
    pub status_updated: bool,
    pub connected: usize,
    pub battery_reads: usize,
    pub battery_failures: usize,
    /// Whether any device state differs from the previous cycle.
    pub changed: bool,
}

#[derive(Debug, Clone)]
struct Settings {
    workers: usize,
    query_timeout: Duration,
    refresh_interval: Duration,
    stop_timeout: Duration,
}

impl From<&MonitorConfig> for Settings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            workers: config.worker_count(),
            query_timeout: config.query_timeout(),
            refresh_interval: config.refresh_interval(),
            stop_timeout: config.stop_timeout(),
        }
    }
}

/// Results of one fan-out across the worker pool, keyed by device index.
struct FanOut<T> {
    results: Vec<(usize, std::result::Result<T, QueryError>)>,
    panicked: usize,
}

struct Engine {
    query: Arc<dyn DeviceQuery>,
    settings: Settings,
    devices: RwLock<DeviceCollection>,
    cycle: CycleLock<()>,
    states: watch::Sender<Vec<DeviceState>>,
}

/// Owns the device set and keeps it in sync with the host.
///
/// Each refresh works on a private copy of the collection and swaps it in
/// once the cycle completes, so readers always see whole cycles.
pub struct BluetoothManager {
    engine: Arc<Engine>,
    auto_refresh: Mutex<Option<AutoRefresh>>,
}

impl BluetoothManager {
    /// Enumerates devices, correlates their status, resolves instance ids and
    /// runs a first refresh. Starts auto-refresh if the config asks for it.
    pub async fn new(query: Arc<dyn DeviceQuery>, config: &MonitorConfig) -> Result<Self> {
        info!("Initialising bluetooth devices...");

        let (states, _) = watch::channel(Vec::new());
        let engine = Arc::new(Engine {
            query,
            settings: Settings::from(config),
            devices: RwLock::new(DeviceCollection::new()),
            cycle: CycleLock::new(()),
            states,
        });

        engine.setup().await;

        let manager = Self {
            engine,
            auto_refresh: Mutex::new(None),
        };

        if let Err(e) = manager.refresh().await {
            error!("Initial refresh failed: {}", e);
        }

        if config.auto_refresh {
            manager.start_auto_refresh()?;
        }

        Ok(manager)
    }

    /// Snapshot of the device set as of the last completed cycle.
    pub async fn devices(&self) -> DeviceCollection {
        self.engine.devices.read().await.clone()
    }

    pub async fn device(&self, name: &str) -> Option<Device> {
        self.engine.devices.read().await.get(name).cloned()
    }

    pub async fn states(&self) -> Vec<DeviceState> {
        self.engine.devices.read().await.states()
    }

    /// Receiver notified whenever a cycle changes any device state.
    pub fn subscribe(&self) -> watch::Receiver<Vec<DeviceState>> {
        self.engine.states.subscribe()
    }

    /// Status correlation followed by a battery read of every connected device.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        self.engine.refresh().await
    }

    pub fn start_auto_refresh(&self) -> Result<()> {
        let mut slot = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if slot.as_ref().is_some_and(|running| !running.is_finished()) {
            return Err(BluetoothError::AlreadyRunning);
        }

        let engine = self.engine.clone();
        *slot = Some(AutoRefresh::spawn(
            self.engine.settings.refresh_interval,
            move || {
                let engine = engine.clone();
                async move { engine.refresh().await }
            },
        ));
        Ok(())
    }

    /// Asks the background loop to stop and waits for it. No-op if it was
    /// never started.
    pub async fn stop_auto_refresh(&self) -> Result<()> {
        let running = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match running {
            Some(auto_refresh) => auto_refresh.stop(self.engine.settings.stop_timeout).await,
            None => {
                debug!("Auto-refresh is not running");
                Ok(())
            }
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.is_finished())
    }
}

impl Drop for BluetoothManager {
    fn drop(&mut self) {
        let slot = self
            .auto_refresh
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(auto_refresh) = slot.take() {
            auto_refresh.cancel();
        }
    }
}

impl Engine {
    async fn setup(&self) {
        let mut devices = self.enumerate().await;
        info!("Found {} bluetooth devices", devices.len());

        self.update_statuses(&mut devices).await;

        info!("Resolving instance ids...");
        let panicked = self.resolve_instance_ids(&mut devices).await;
        if panicked > 0 {
            error!("{} instance id workers panicked", panicked);
        }

        for device in &devices {
            info!(
                "> {} - connected: {} - {}",
                device.name(),
                device.is_connected(),
                device.instance_id()
            );
        }

        let _cycle = self.cycle.lock().await;
        self.publish(devices).await;
    }

    async fn enumerate(&self) -> DeviceCollection {
        match with_timeout(self.settings.query_timeout, self.query.bluetooth_device_names()).await {
            Ok(names) => names
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(Device::new)
                .collect(),
            Err(e) => {
                warn!("Bluetooth enumeration failed: {}", e);
                DeviceCollection::new()
            }
        }
    }

    async fn refresh(&self) -> Result<RefreshReport> {
        let _cycle = self.cycle.lock().await;
        let mut devices = self.devices.read().await.clone();

        let mut report = RefreshReport {
            status_updated: self.update_statuses(&mut devices).await,
            ..RefreshReport::default()
        };

        // Statuses are final for this cycle before any battery read is issued.
        let panicked = self.read_battery_levels(&mut devices, &mut report).await;
        report.changed = self.publish(devices).await;

        if panicked > 0 {
            return Err(BluetoothError::Worker { failed: panicked });
        }
        Ok(report)
    }

    /// Returns false if the listing failed, in which case `devices` is untouched.
    async fn update_statuses(&self, devices: &mut DeviceCollection) -> bool {
        match with_timeout(self.settings.query_timeout, self.query.audio_endpoints()).await {
            Ok(endpoints) => {
                apply_endpoint_statuses(devices, &endpoints);
                true
            }
            Err(e) => {
                warn!("Audio endpoint listing failed, keeping previous statuses: {}", e);
                false
            }
        }
    }

    async fn resolve_instance_ids(&self, devices: &mut DeviceCollection) -> usize {
        let jobs: Vec<(usize, String)> = devices
            .iter()
            .enumerate()
            .filter(|(_, device)| !device.has_instance_id())
            .map(|(index, device)| (index, device.name().to_string()))
            .collect();

        let fan_out = self
            .fan_out(jobs, |query, name| async move {
                query.resolve_instance_id(&name).await
            })
            .await;

        for (index, result) in fan_out.results {
            let Some(device) = devices.by_index_mut(index) else {
                continue;
            };
            match result {
                Ok(instance_id) if instance_id.is_empty() => {
                    debug!("No battery-capable instance found for {}", device.name());
                }
                Ok(instance_id) => device.set_instance_id(instance_id),
                Err(e) => warn!("Failed to resolve instance id for {}: {}", device.name(), e),
            }
        }

        fan_out.panicked
    }

    async fn read_battery_levels(
        &self,
        devices: &mut DeviceCollection,
        report: &mut RefreshReport,
    ) -> usize {
        let mut jobs = Vec::new();
        for (index, device) in devices.iter().enumerate() {
            if !device.is_connected() {
                continue;
            }
            report.connected += 1;
            if device.has_instance_id() {
                jobs.push((index, device.instance_id().to_string()));
            } else {
                debug!("Skipping battery read for {}: no instance id", device.name());
            }
        }

        let fan_out = self
            .fan_out(jobs, |query, instance_id| async move {
                query.battery_level(&instance_id).await
            })
            .await;

        for (index, result) in fan_out.results {
            let Some(device) = devices.by_index_mut(index) else {
                continue;
            };
            let outcome = result
                .map_err(BluetoothError::from)
                .and_then(|level| device.set_battery_level(level).map_err(BluetoothError::from));
            match outcome {
                Ok(()) => report.battery_reads += 1,
                Err(e) => {
                    report.battery_failures += 1;
                    warn!("Failed to read battery level for {}: {}", device.name(), e);
                }
            }
        }

        report.battery_failures += fan_out.panicked;
        fan_out.panicked
    }

    /// Runs one query per job on the worker pool. Each job targets a single
    /// device; results are applied by the caller after every job has finished.
    async fn fan_out<T, F, Fut>(&self, jobs: Vec<(usize, String)>, call: F) -> FanOut<T>
    where
        T: Send + 'static,
        F: Fn(Arc<dyn DeviceQuery>, String) -> Fut,
        Fut: Future<Output = std::result::Result<T, QueryError>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let limit = self.settings.query_timeout;
        let mut tasks = JoinSet::new();

        for (index, key) in jobs {
            let permits = permits.clone();
            let call = call(self.query.clone(), key);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, with_timeout(limit, call).await)
            });
        }

        let mut fan_out = FanOut {
            results: Vec::new(),
            panicked: 0,
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => fan_out.results.push(result),
                Err(e) => {
                    error!("Query worker failed: {}", e);
                    fan_out.panicked += 1;
                }
            }
        }
        fan_out
    }

    /// Swaps in the cycle's collection and notifies subscribers if anything
    /// changed. Callers hold the cycle lock.
    async fn publish(&self, devices: DeviceCollection) -> bool {
        let states = devices.states();
        *self.devices.write().await = devices;
        self.states.send_if_modified(|current| {
            if *current == states {
                false
            } else {
                *current = states;
                true
            }
        })
    }
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = std::result::Result<T, QueryError>>,
) -> std::result::Result<T, QueryError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout(limit)),
    }
}

/// Assigns connectivity from an endpoint listing.
///
/// Each endpoint goes to the first device (in collection order) whose name
/// is contained in the endpoint name. A device keeps the status of the first
/// endpoint assigned to it; later endpoints mapping to the same device are
/// ignored. Devices without a matching endpoint keep their status.
pub fn apply_endpoint_statuses(devices: &mut DeviceCollection, endpoints: &[AudioEndpoint]) {
    let mut assigned = vec![false; devices.len()];

    for endpoint in endpoints {
        let matched = devices
            .iter()
            .position(|device| !device.name().is_empty() && endpoint.name.contains(device.name()));

        let Some(index) = matched else {
            continue;
        };
        if assigned[index] {
            continue;
        }
        assigned[index] = true;

        if let Some(device) = devices.by_index_mut(index) {
            device.set_connected(endpoint.is_connected());
        }
    }
}
