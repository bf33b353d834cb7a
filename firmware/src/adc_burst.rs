//! ADC1 + DMA1 CH1 によるキャリア同期サンプリング
//!
//! キャリア割り込みでレギュラーシーケンス（電流 → 電圧 → スロットル）を
//! ソフトウェア起動し、DMAが3つの結果を `BURST_BUF` に転送します。
//! シーケンス完了（EOS）でADC1_2割り込みが発生します。
//!
//! DMAの残り転送数（NDTR）から実際に取り込めた個数を求め、
//! 3個に満たないバーストは制御側で破棄されます。

use core::ptr::{addr_of, addr_of_mut};

use embassy_stm32::{adc::Adc, pac, peripherals};
use sixstep::{RawBurst, SampleAcquisition, BURST_LEN};

use crate::config::adc::{
    CURRENT_CHANNEL, DMAMUX_REQUEST_ADC1, THROTTLE_CHANNEL, VOLTAGE_CHANNEL,
};
use crate::fmt::*;

/// DMA転送先（DMAだけが書き、割り込みだけが読む）
static mut BURST_BUF: [u16; BURST_LEN as usize] = [0; BURST_LEN as usize];

/// DMA1 CH1（DMAMUX1 チャネル0）
const DMA_CH: usize = 0;

/// キャリア同期バーストサンプラー
pub struct AdcBurst {
    _private: (),
}

impl AdcBurst {
    /// embassyで初期化済みのADC1をバースト用に再設定する
    ///
    /// ADCのキャリブレーション・サンプル時間設定はembassy側で済んでいること
    /// （各チャネルを一度 `blocking_read` しておく）。
    pub fn new(adc: Adc<'static, peripherals::ADC1>) -> Self {
        let rcc = pac::RCC;
        let adc1 = pac::ADC1;
        let dma = pac::DMA1;
        let dmamux = pac::DMAMUX1;

        rcc.ahb1enr().modify(|w| {
            w.set_dma1en(true);
            w.set_dmamux1en(true);
        });

        // レギュラーシーケンス: 3変換
        adc1.sqr1().modify(|w| {
            w.set_l(BURST_LEN - 1);
            w.set_sq(0, CURRENT_CHANNEL);
            w.set_sq(1, VOLTAGE_CHANNEL);
            w.set_sq(2, THROTTLE_CHANNEL);
        });
        adc1.cfgr().modify(|w| {
            w.set_cont(false);
            w.set_exten(pac::adc::vals::Exten::DISABLED); // ソフトウェア起動
            w.set_dmacfg(pac::adc::vals::Dmacfg::ONE_SHOT);
            w.set_dmaen(pac::adc::vals::Dmaen::ENABLE);
        });

        // DMA: ADC1_DR → BURST_BUF、16ビット、メモリインクリメント
        dmamux.ccr(DMA_CH).write(|w| w.set_dmareq_id(DMAMUX_REQUEST_ADC1));
        let ch = dma.ch(DMA_CH);
        ch.cr().write(|w| w.set_en(false));
        ch.par().write_value(adc1.dr().as_ptr() as u32);
        ch.mar().write_value(addr_of_mut!(BURST_BUF) as u32);
        ch.ndtr().write(|w| w.set_ndt(BURST_LEN as u16));
        ch.cr().write(|w| {
            w.set_dir(pac::bdma::vals::Dir::FROM_PERIPHERAL);
            w.set_psize(pac::bdma::vals::Size::BITS16);
            w.set_msize(pac::bdma::vals::Size::BITS16);
            w.set_minc(true);
            w.set_circ(false);
            w.set_pl(pac::bdma::vals::Pl::VERY_HIGH);
        });

        // EOSで割り込み（NVIC側はhardware::enable_control_interrupts）
        adc1.isr().write(|w| {
            w.set_eos(true);
            w.set_eoc(true);
            w.set_ovr(true);
        });
        adc1.ier().modify(|w| w.set_eosie(true));

        // ドロップでADCが無効化されないよう forget する
        core::mem::forget(adc);

        info!(
            "ADC1 burst armed: channels [{}, {}, {}] via DMA1 CH1",
            CURRENT_CHANNEL, VOLTAGE_CHANNEL, THROTTLE_CHANNEL
        );
        Self { _private: () }
    }

    /// バースト完了フラグをクリア（ADC1_2割り込みの先頭で呼ぶ）
    #[inline(always)]
    pub fn acknowledge_end_of_sequence() {
        pac::ADC1.isr().write(|w| w.set_eos(true));
    }
}

impl SampleAcquisition for AdcBurst {
    #[inline(always)]
    fn start_burst(&mut self) {
        // DMAを再装填してから変換開始
        let ch = pac::DMA1.ch(DMA_CH);
        ch.cr().modify(|w| w.set_en(false));
        ch.ndtr().write(|w| w.set_ndt(BURST_LEN as u16));
        ch.cr().modify(|w| w.set_en(true));
        pac::ADC1.cr().modify(|w| w.set_adstart(true));
    }

    #[inline(always)]
    fn acknowledge_carrier(&mut self) {
        pac::TIM1.sr().modify(|w| w.set_uif(false));
    }

    #[inline(always)]
    fn drain_stale(&mut self) {
        // 読まれなかった前回バーストのオーバーラン/EOCを捨てる
        pac::ADC1.isr().write(|w| {
            w.set_ovr(true);
            w.set_eoc(true);
        });
    }

    #[inline(always)]
    fn take_burst(&mut self) -> RawBurst {
        let remaining = pac::DMA1.ch(DMA_CH).ndtr().read().ndt();
        let depth = BURST_LEN.saturating_sub(remaining as u8);
        // Safety: NDTR=0 ならDMAはもう書き込まない。途中のバーストは制御側で破棄される
        let samples = unsafe { core::ptr::read_volatile(addr_of!(BURST_BUF)) };
        RawBurst { depth, samples }
    }
}
