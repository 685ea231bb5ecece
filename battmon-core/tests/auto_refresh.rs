mod helpers;

use std::time::{Duration, Instant};

use battmon_core::{BluetoothError, BluetoothManager};
use helpers::{alpha_buds, auto_config, manual_config, Reply};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_then_stop_returns_within_bound() {
    let query = alpha_buds();
    let manager = BluetoothManager::new(query.clone(), &auto_config())
        .await
        .unwrap();
    assert!(manager.is_auto_refreshing());

    let started = Instant::now();
    manager.stop_auto_refresh().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!manager.is_auto_refreshing());
}

#[tokio::test]
async fn stop_without_start_is_a_no_op() {
    let query = alpha_buds();
    let manager = BluetoothManager::new(query.clone(), &manual_config())
        .await
        .unwrap();

    assert!(!manager.is_auto_refreshing());
    manager.stop_auto_refresh().await.unwrap();
    manager.stop_auto_refresh().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_start_is_rejected_while_running() {
    let query = alpha_buds();
    let manager = BluetoothManager::new(query.clone(), &manual_config())
        .await
        .unwrap();

    manager.start_auto_refresh().unwrap();
    assert!(matches!(
        manager.start_auto_refresh(),
        Err(BluetoothError::AlreadyRunning)
    ));

    manager.stop_auto_refresh().await.unwrap();
    manager.start_auto_refresh().unwrap();
    manager.stop_auto_refresh().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loop_keeps_running_after_failed_cycles() {
    let query = alpha_buds();
    query.set_battery("BTHENUM\\DEV_1234", Reply::Panic);
    let manager = BluetoothManager::new(query.clone(), &auto_config())
        .await
        .unwrap();

    let calls_at_start = query.endpoint_calls();
    tokio::time::timeout(Duration::from_secs(5), async {
        while query.endpoint_calls() < calls_at_start + 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("background loop should keep refreshing");

    assert!(manager.is_auto_refreshing());
    manager.stop_auto_refresh().await.unwrap();
    assert!(!manager.is_auto_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn background_loop_publishes_disconnects() {
    let query = alpha_buds();
    let manager = BluetoothManager::new(query.clone(), &auto_config())
        .await
        .unwrap();
    let mut states = manager.subscribe();

    query.set_endpoints(&[("Headphones (AlphaBuds)", "Unknown")]);

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            states.changed().await.unwrap();
            if !states.borrow_and_update()[0].connected {
                break;
            }
        }
    })
    .await
    .expect("disconnect should be published");

    manager.stop_auto_refresh().await.unwrap();

    let device = manager.device("AlphaBuds").await.unwrap();
    assert!(!device.is_connected());
    assert_eq!(device.battery_level(), Some(85));
}
