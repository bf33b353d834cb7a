//! ハードウェア初期化モジュール
//!
//! クロック設定と制御割り込みの優先度設定を集約します。

use embassy_stm32::{
    interrupt::{self, InterruptExt, Priority},
    Config,
};

use crate::fmt::*;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// 制御割り込み（TIM1更新 / ADC1_2）を有効化
///
/// 2つのハンドラは同じ優先度で、互いに割り込まない。
/// 制御エンジンを `control_isr::install` で登録した後に呼ぶこと。
pub fn enable_control_interrupts() {
    interrupt::TIM1_UP_TIM16.set_priority(Priority::P0);
    interrupt::ADC1_2.set_priority(Priority::P0);

    interrupt::TIM1_UP_TIM16.unpend();
    interrupt::ADC1_2.unpend();

    // Safety: 両ハンドラはcontrol_isrで定義済み、共有状態はcritical_section::Mutexで保護
    unsafe {
        interrupt::ADC1_2.enable();
        interrupt::TIM1_UP_TIM16.enable();
    }
    info!("Control interrupts enabled (TIM1_UP_TIM16, ADC1_2 @ P0)");
}
