//! テレメトリ出力タスク
//!
//! 制御割り込みが公開した状態を定期的にログ出力します。
//! 各値は個別にアトミックなので、フィールド間で1周期ずれることがあります。

use embassy_time::{Duration, Ticker};

use crate::benchmark::cycles_to_us;
use crate::config::{ISR_TIMING_LOG_DIVIDER, TELEMETRY_PERIOD_MS};
use crate::fmt::*;
use crate::state::TELEMETRY;

/// テレメトリ出力タスク
#[embassy_executor::task]
pub async fn telemetry_task() {
    info!("Telemetry task started ({}ms)", TELEMETRY_PERIOD_MS);

    let mut ticker = Ticker::every(Duration::from_millis(TELEMETRY_PERIOD_MS));
    let mut log_counter = 0u32;
    let mut last_skipped = 0u32;

    loop {
        ticker.next().await;

        let t = TELEMETRY.snapshot();
        info!(
            "I={}mA I_ref={}mA duty={} V={}mV thr={} hall={} state={}",
            t.current_ma,
            t.current_target_ma,
            t.duty_cycle,
            t.voltage_mv,
            t.throttle,
            t.hall.bits(),
            t.state.to_raw()
        );

        // 間引いて割り込み処理時間とサンプル破棄数を出す
        log_counter += 1;
        if log_counter >= ISR_TIMING_LOG_DIVIDER {
            log_counter = 0;
            let skipped = t.skipped_bursts.wrapping_sub(last_skipped);
            last_skipped = t.skipped_bursts;
            info!(
                "[ISR] last={}cyc ({}us) max={}cyc ({}us) cycles={} skipped+{}",
                t.isr_cycles_last,
                cycles_to_us(t.isr_cycles_last),
                t.isr_cycles_max,
                cycles_to_us(t.isr_cycles_max),
                t.completed_cycles,
                skipped
            );
            if skipped > 0 {
                warn!("{} ADC bursts discarded in the last interval", skipped);
            }
            TELEMETRY.reset_isr_max();
        }
    }
}
