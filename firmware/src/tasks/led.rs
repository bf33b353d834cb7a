//! LED制御タスク
//!
//! コントローラの状態をLEDで表示します。
//!
//! - LED1: ハートビート（稼働中 500ms、故障時 100ms で点滅）
//! - LED2: 転流中（いずれかのセクターを駆動している間点灯）
//! - LED3: 故障 / バス電圧異常

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};

use crate::fmt::*;
use crate::state::{CONTROLLER_STATUS, TELEMETRY, VOLTAGE_STATE};

/// LED制御タスク
#[embassy_executor::task]
pub async fn led_task(
    mut led1: Output<'static>,
    mut led2: Output<'static>,
    mut led3: Output<'static>,
) {
    info!("LED task started");

    loop {
        let status = *CONTROLLER_STATUS.lock().await;
        let voltage_ok = VOLTAGE_STATE.lock().await.is_voltage_ok();

        let half_period = if status.is_fault() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(500)
        };

        if TELEMETRY.snapshot().state.is_energized() {
            led2.set_high();
        } else {
            led2.set_low();
        }

        if status.is_fault() || !voltage_ok {
            led3.set_high();
        } else {
            led3.set_low();
        }

        led1.toggle();
        Timer::after(half_period).await;
    }
}
