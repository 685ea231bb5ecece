//! Scripted `DeviceQuery` used by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use battmon_core::{AudioEndpoint, DeviceQuery, MonitorConfig, QueryError};

/// What a scripted call does when invoked.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Value(T),
    Fail,
    Panic,
    Hang,
}

impl<T: Clone> Reply<T> {
    async fn play(&self, what: &str) -> Result<T, QueryError> {
        match self {
            Reply::Value(value) => Ok(value.clone()),
            Reply::Fail => Err(QueryError::Failed {
                status: "exit code: 1".to_string(),
                stderr: format!("scripted failure: {what}"),
            }),
            Reply::Panic => panic!("scripted panic: {what}"),
            Reply::Hang => std::future::pending().await,
        }
    }
}

pub struct ScriptedQuery {
    names: Mutex<Reply<Vec<String>>>,
    endpoints: Mutex<Reply<Vec<AudioEndpoint>>>,
    instance_ids: Mutex<HashMap<String, Reply<String>>>,
    battery_levels: Mutex<HashMap<String, Reply<u8>>>,
    battery_reads: Mutex<Vec<String>>,
    endpoint_calls: AtomicUsize,
}

impl ScriptedQuery {
    pub fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            names: Mutex::new(Reply::Value(names.iter().map(|n| n.to_string()).collect())),
            endpoints: Mutex::new(Reply::Value(Vec::new())),
            instance_ids: Mutex::new(HashMap::new()),
            battery_levels: Mutex::new(HashMap::new()),
            battery_reads: Mutex::new(Vec::new()),
            endpoint_calls: AtomicUsize::new(0),
        })
    }

    pub fn fail_enumeration(&self) {
        *self.names.lock().unwrap() = Reply::Fail;
    }

    pub fn set_endpoints(&self, endpoints: &[(&str, &str)]) {
        let endpoints = endpoints
            .iter()
            .map(|(name, status)| AudioEndpoint::new(*name, *status))
            .collect();
        *self.endpoints.lock().unwrap() = Reply::Value(endpoints);
    }

    pub fn fail_endpoints(&self) {
        *self.endpoints.lock().unwrap() = Reply::Fail;
    }

    pub fn set_instance_id(&self, name: &str, reply: Reply<String>) {
        self.instance_ids
            .lock()
            .unwrap()
            .insert(name.to_string(), reply);
    }

    pub fn set_battery(&self, instance_id: &str, reply: Reply<u8>) {
        self.battery_levels
            .lock()
            .unwrap()
            .insert(instance_id.to_string(), reply);
    }

    /// Instance ids whose battery was queried, in call order.
    pub fn battery_reads(&self) -> Vec<String> {
        self.battery_reads.lock().unwrap().clone()
    }

    pub fn endpoint_calls(&self) -> usize {
        self.endpoint_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceQuery for ScriptedQuery {
    async fn bluetooth_device_names(&self) -> Result<Vec<String>, QueryError> {
        let reply = self.names.lock().unwrap().clone();
        reply.play("enumeration").await
    }

    async fn audio_endpoints(&self) -> Result<Vec<AudioEndpoint>, QueryError> {
        self.endpoint_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.endpoints.lock().unwrap().clone();
        reply.play("audio endpoints").await
    }

    async fn resolve_instance_id(&self, name: &str) -> Result<String, QueryError> {
        let reply = self
            .instance_ids
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(Reply::Value(String::new()));
        reply.play(name).await
    }

    async fn battery_level(&self, instance_id: &str) -> Result<u8, QueryError> {
        self.battery_reads
            .lock()
            .unwrap()
            .push(instance_id.to_string());
        let reply = self
            .battery_levels
            .lock()
            .unwrap()
            .get(instance_id)
            .cloned()
            .unwrap_or(Reply::Fail);
        reply.play(instance_id).await
    }
}

pub fn manual_config() -> MonitorConfig {
    MonitorConfig {
        auto_refresh: false,
        workers: 4,
        query_timeout_secs: 1,
        stop_timeout_secs: 5,
        ..MonitorConfig::default()
    }
}

pub fn auto_config() -> MonitorConfig {
    MonitorConfig {
        auto_refresh: true,
        ..manual_config()
    }
}

/// One paired headset: "AlphaBuds" at 85% behind `BTHENUM\DEV_1234`.
pub fn alpha_buds() -> Arc<ScriptedQuery> {
    let query = ScriptedQuery::new(&["AlphaBuds"]);
    query.set_endpoints(&[("Headphones (AlphaBuds)", "OK")]);
    query.set_instance_id("AlphaBuds", Reply::Value("BTHENUM\\DEV_1234".to_string()));
    query.set_battery("BTHENUM\\DEV_1234", Reply::Value(85));
    query
}
