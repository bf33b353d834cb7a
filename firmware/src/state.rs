//! グローバル共有状態管理
//!
//! 制御割り込みが書くテレメトリはアトミック変数の集合（`Telemetry`）、
//! タスク間で共有する状態はMutexで保護して管理します。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;
use sixstep::{Telemetry, VoltageMonitorState};

/// 制御割り込みが毎周期公開する状態（割り込み → タスク、ロックなし）
pub static TELEMETRY: Telemetry = Telemetry::new();

/// 起動シーケンスの進行状況
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerStatus {
    /// 起動中（ADCゼロ点計測など）
    Starting,
    /// Hall同定スイープ中
    Identifying,
    /// 制御割り込み稼働中
    Running,
    /// Hall同定失敗。出力オフのまま転流を拒否
    CalibrationFailed,
    /// 設定値が不正。出力オフのまま停止
    ConfigInvalid,
}

impl ControllerStatus {
    /// 出力を止めたまま復帰しない状態か
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            ControllerStatus::CalibrationFailed | ControllerStatus::ConfigInvalid
        )
    }
}

/// コントローラの状態（LED表示用）
pub static CONTROLLER_STATUS: Mutex<ThreadModeRawMutex, ControllerStatus> =
    Mutex::new(ControllerStatus::Starting);

/// 電圧監視ステータス（診断用）
pub static VOLTAGE_STATE: Mutex<ThreadModeRawMutex, VoltageMonitorState> =
    Mutex::new(VoltageMonitorState::new());
