//! ベンチマークモジュール
//!
//! DWTサイクルカウンタで制御割り込みの処理時間を計測します。

use cortex_m::peripheral::DWT;

/// DWTサイクルカウンタを有効化
///
/// # Safety
/// Cortex-Mペリフェラルへの直接アクセスを含む
pub unsafe fn enable_cycle_counter() {
    let mut cp = cortex_m::Peripherals::steal();
    cp.DCB.enable_trace();
    cp.DWT.enable_cycle_counter();
}

/// クロージャの実行にかかったCPUサイクル数を返す
///
/// # 戻り値
/// (クロージャの戻り値, 経過サイクル数)
#[inline(always)]
pub fn measure_cycles<R>(f: impl FnOnce() -> R) -> (R, u32) {
    let start = DWT::cycle_count();
    let result = f();
    let elapsed = DWT::cycle_count().wrapping_sub(start);
    (result, elapsed)
}

/// サイクル数をマイクロ秒に換算（170MHz）
#[inline(always)]
pub fn cycles_to_us(cycles: u32) -> u32 {
    cycles / 170
}
