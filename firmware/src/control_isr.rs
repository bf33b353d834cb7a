//! 割り込み駆動の6ステップ制御
//!
//! 制御エンジン（`sixstep::ControlCycle`）は割り込みコンテキストに置き、
//! 2つのハンドラから呼び出します。
//!
//! - `TIM1_UP_TIM16`: キャリア中点。ADCバーストを起動
//! - `ADC1_2`: バースト完了。制御周期を1回実行
//!
//! 両ハンドラは同じ優先度なので互いに割り込まず、1周期内では必ず
//! キャリア割り込みが先に走ります。

use core::ptr::addr_of_mut;

use embassy_stm32::pac;
use sixstep::{ControlCycle, CycleOutcome};

use crate::adc_burst::AdcBurst;
use crate::benchmark;
use crate::hall_gpio::HallGpio;
use crate::motor_driver::Tim1Bridges;
use crate::state::TELEMETRY;

/// 割り込みコンテキストで動く制御エンジン
pub type Engine = ControlCycle<'static, AdcBurst, HallGpio, Tim1Bridges>;

/// 制御エンジン本体
///
/// 書き込みは `install` だけ（NVIC有効化前）。以降は同じ優先度の2つの
/// ハンドラだけが触るので、ハンドラ内では割り込みを禁止しない。
static mut ENGINE: Option<Engine> = None;

/// 制御エンジンを登録する
///
/// 転流表はこの時点で確定する。割り込みを有効化する前に呼ぶこと。
pub fn install(engine: Engine) {
    critical_section::with(|_| {
        // Safety: 制御割り込みはまだ無効（hardware::enable_control_interrupts の前）
        unsafe { *addr_of_mut!(ENGINE) = Some(engine) };
    });
}

/// 登録済みエンジンへの排他参照
///
/// # Safety
/// TIM1_UP_TIM16 / ADC1_2 ハンドラからのみ呼ぶこと。両者は同じ優先度で
/// 互いに割り込まず、`install` は割り込み有効化前に完了している。
#[inline(always)]
unsafe fn engine() -> Option<&'static mut Engine> {
    (*addr_of_mut!(ENGINE)).as_mut()
}

/// キャリア中点（TIM1更新イベント）ハンドラ
#[inline(always)]
fn on_carrier_edge() {
    // Safety: 制御割り込みコンテキスト
    match unsafe { engine() } {
        Some(engine) => engine.on_carrier_edge(),
        // エンジン未登録: フラグだけ落として何もしない
        None => pac::TIM1.sr().modify(|w| w.set_uif(false)),
    }
}

/// バースト完了（ADC1 EOS）ハンドラ
///
/// 割り込み禁止区間はエンジン内のバースト読み取りだけ。
#[inline(always)]
fn on_samples_ready() -> Option<CycleOutcome> {
    AdcBurst::acknowledge_end_of_sequence();
    // Safety: 制御割り込みコンテキスト
    unsafe { engine() }.map(|engine| engine.on_samples_ready())
}

/// TIM1更新割り込みのRust側エントリーポイント
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn TIM1_UP_TIM16() {
    on_carrier_edge();
}

/// ADC1_2割り込みのRust側エントリーポイント
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn ADC1_2() {
    let (_, cycles) = benchmark::measure_cycles(on_samples_ready);
    TELEMETRY.record_isr_cycles(cycles);
}
