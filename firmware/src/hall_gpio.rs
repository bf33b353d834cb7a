//! GPIO直接読み取りによるHallセンサー入力
//!
//! 制御割り込みから1回の読み取りごとにIDRを直接読む。
//! 多数決フィルタは `sixstep::HallReader` 側で行う。
//!
//! ## ハードウェア構成
//! - PB6: Hall H1
//! - PB7: Hall H2
//! - PB8: Hall H3

use embassy_stm32::pac;
use sixstep::HallLines;

use crate::config::hall::PINS;
use crate::fmt::*;

/// GPIOB上の3本のHall入力
///
/// レジスタを直接読むだけのゼロサイズ型。`HallGpio::init` で
/// ピンを入力に設定してから生成する。
pub struct HallGpio {
    _private: (),
}

impl HallGpio {
    /// PB6/PB7/PB8を入力に設定してハンドルを返す
    ///
    /// # Safety
    /// PACを使用した直接レジスタ操作を含む。PB6-8を他で使わないこと。
    pub unsafe fn init() -> Self {
        let rcc = pac::RCC;
        let gpiob = pac::GPIOB;

        rcc.ahb2enr().modify(|w| w.set_gpioben(true)); // GPIOB

        // 注: センサー基板側にプルアップがあるため内部プルアップは使わない
        for pin in PINS {
            gpiob
                .moder()
                .modify(|w| w.set_moder(pin, pac::gpio::vals::Moder::INPUT));
            gpiob
                .pupdr()
                .modify(|w| w.set_pupdr(pin, pac::gpio::vals::Pupdr::FLOATING));
        }

        info!("Hall inputs configured on PB6/PB7/PB8");
        Self { _private: () }
    }
}

impl HallLines for HallGpio {
    #[inline(always)]
    fn levels(&mut self) -> [bool; 3] {
        let idr = pac::GPIOB.idr().read();
        [
            idr.idr(PINS[0]) as u8 != 0,
            idr.idr(PINS[1]) as u8 != 0,
            idr.idr(PINS[2]) as u8 != 0,
        ]
    }
}
