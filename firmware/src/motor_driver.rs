//! モータードライバー抽象化レイヤー
//!
//! TIM1の3組の相補PWM出力で6ステップ駆動のハーフブリッジを実現します。
//! 初期設定はembassyの `ComplementaryPwm` で行い、以降の出力更新は
//! 制御割り込みからPACで直接レジスタに書き込みます。

use embassy_stm32::{
    pac, peripherals,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
};
use sixstep::{HalfBridges, PhaseOutputs};

use crate::fmt::*;

const CHANNELS: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

/// 3相モータードライバー（初期化用）
///
/// STM32のComplementaryPwmを6ステップ駆動向けに設定します。
pub struct MotorDriver {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
}

impl MotorDriver {
    /// 新しいモータードライバーを作成
    ///
    /// 全チャネルを無効化し、デッドタイムを設定します。
    ///
    /// # 引数
    /// * `pwm` - PWMペリフェラル（TIM1、センターアライン）
    /// * `dead_time` - BDTR.DTG に設定するデッドタイム
    pub fn new(mut pwm: ComplementaryPwm<'static, peripherals::TIM1>, dead_time: u16) -> Self {
        for ch in CHANNELS {
            pwm.disable(ch);
            pwm.set_duty(ch, 0);
        }
        pwm.set_dead_time(dead_time);
        let max_duty = pwm.get_max_duty();
        info!("TIM1 configured: max_duty={}, dead_time={}", max_duty, dead_time);
        Self { pwm, max_duty }
    }

    /// 制御割り込み用のハーフブリッジ出力に変換
    ///
    /// 繰り返しカウンタを1にして、センターアラインの谷と山のうち
    /// 片方でのみ更新イベント（= キャリア割り込み）を発生させます。
    ///
    /// CCERはプリロード（CR2.CCPC）にしてCOMイベントで確定させ、
    /// CCRのプリロードは切ってCOMと同時に反映させる。6出力は
    /// `write` ごとに1回のCOMGでまとめて切り替わる。
    /// ドロップでタイマーが止まらないよう `ComplementaryPwm` は forget する。
    pub fn into_bridges(self) -> Tim1Bridges {
        let tim1 = pac::TIM1;
        tim1.ccmr_output(0).modify(|w| {
            w.set_ocpe(0, false);
            w.set_ocpe(1, false);
        });
        tim1.ccmr_output(1).modify(|w| w.set_ocpe(0, false));
        tim1.cr2().modify(|w| w.set_ccpc(true));
        tim1.rcr().write(|w| w.set_rep(1));
        tim1.egr().write(|w| w.set_ug(true)); // RCRを反映
        tim1.sr().modify(|w| w.set_uif(false));
        tim1.dier().modify(|w| w.set_uie(true));

        let bridges = Tim1Bridges {
            max_duty: self.max_duty,
        };
        core::mem::forget(self.pwm);
        bridges
    }
}

/// TIM1 CH1-3 / CH1N-3N によるハーフブリッジ出力
///
/// - `high` はCCRxに8ビット値をスケールして書き込む
/// - `low` が非ゼロならCHxNを有効化（相補動作、ギャップはハードウェアデッドタイム）
/// - `high`/`low` とも0の相は両出力を無効化（フローティング）
pub struct Tim1Bridges {
    max_duty: u16,
}

impl Tim1Bridges {
    #[inline(always)]
    fn scale(&self, level: u8) -> u16 {
        ((level as u32 * self.max_duty as u32) / 255) as u16
    }
}

impl HalfBridges for Tim1Bridges {
    #[inline]
    fn write(&mut self, outputs: &PhaseOutputs) {
        let tim1 = pac::TIM1;

        for phase in 0..3 {
            let ccr = self.scale(outputs.high[phase]);
            tim1.ccr(phase).write(|w| w.set_ccr(ccr));
        }

        // CCERはプリロード側に3相分を1回で書く
        tim1.ccer().modify(|w| {
            for phase in 0..3 {
                let active = outputs.is_phase_active(phase);
                w.set_cce(phase, active);
                w.set_ccne(phase, outputs.low[phase] != 0);
            }
        });

        // COMでCCERを確定（CCRはプリロードなしなので同時に有効）
        tim1.egr().write(|w| w.set_comg(true));
    }
}
