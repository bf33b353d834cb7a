//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。
//! 制御そのものは割り込みで動き、タスクは監視と表示だけを行います。

pub mod led;
pub mod telemetry;
pub mod voltage_monitor;

// タスク関数を再エクスポート
pub use led::led_task;
pub use telemetry::telemetry_task;
pub use voltage_monitor::voltage_monitor_task;
