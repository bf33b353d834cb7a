//! 電圧監視タスク
//!
//! 制御割り込みが測ったバス電圧にフィルタをかけ、過電圧/低電圧を検出します。
//! 検出結果は診断用で、制御則は変更しません。

use embassy_time::{Duration, Ticker};
use sixstep::{VoltageMonitor, VoltageMonitorConfig};

use crate::config::VOLTAGE_MONITOR_PERIOD_MS;
use crate::fmt::*;
use crate::state::{TELEMETRY, VOLTAGE_STATE};

/// 電圧監視タスク
///
/// # 引数
/// * `initial_mv` - 起動時に読んだバス電圧（フィルタ初期値）
#[embassy_executor::task]
pub async fn voltage_monitor_task(initial_mv: u32) {
    info!("Voltage monitor task started");

    let config = VoltageMonitorConfig::default();
    let mut monitor = VoltageMonitor::new(config);
    info!(
        "Voltage monitor initialized: OV={}mV, UV={}mV",
        config.overvoltage_mv, config.undervoltage_mv
    );

    // 起動時の電圧でフィルタを初期化（起動直後のUNDERVOLTAGE誤検出を防ぐ）
    monitor.initialize(initial_mv);
    let state = monitor.state();
    info!(
        "Initial voltage: {}mV, OV={}, UV={}",
        state.voltage_mv, state.overvoltage, state.undervoltage
    );
    *VOLTAGE_STATE.lock().await = state;

    let mut ticker = Ticker::every(Duration::from_millis(VOLTAGE_MONITOR_PERIOD_MS));

    // デバッグログ用カウンタ（1秒ごとにログ）
    let mut log_counter = 0u32;

    loop {
        ticker.next().await;

        let state = monitor.update(TELEMETRY.voltage_mv());
        *VOLTAGE_STATE.lock().await = state;

        log_counter += 1;
        if log_counter >= 10 {
            log_counter = 0;
            debug!(
                "[Voltage] V_filtered={}mV, OV={}, UV={}",
                state.voltage_mv, state.overvoltage, state.undervoltage
            );
        }
    }
}
