//! ボード設定パラメータ

use sixstep::ControlMode;

/// 制御モード（電流制御 / デューティ直接指令）
pub const CONTROL_MODE: ControlMode = ControlMode::CurrentControlled;

/// 起動時にHallセンサーの同定スイープを行うか
/// falseの場合は `STATIC_COMMUTATION_TABLE` をそのまま使う
pub const IDENTIFY_HALLS: bool = true;

/// 逆回転方向で同定する
pub const IDENTIFY_REVERSE: bool = false;

/// 同定なしで使う Hallコード → セクター表（0..=5 がセクター、255 は出力オフ）
pub const STATIC_COMMUTATION_TABLE: [u8; 8] = sixstep::config::DEFAULT_STATIC_TABLE;

/// 電流チャネルのゼロ点計測に使うサンプル数（出力オフ状態で平均）
pub const ADC_BIAS_OVERSAMPLE: u32 = 1_000;

/// テレメトリ出力周期 [ms]
pub const TELEMETRY_PERIOD_MS: u64 = 100;

/// 割り込み処理時間ログの間引き（テレメトリ周期の何回に1回か）
pub const ISR_TIMING_LOG_DIVIDER: u32 = 10;

/// 電圧監視周期 [ms]
pub const VOLTAGE_MONITOR_PERIOD_MS: u64 = 100;

/// PWM設定
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// キャリア周波数（16kHz、センターアライン）
    pub const FREQUENCY: Hertz = Hertz(16_000);

    /// デッドタイム（TIM1 BDTR.DTG、170MHzで 1カウント ≈ 5.9ns → 85 ≈ 500ns）
    pub const DEAD_TIME: u16 = 85;
}

/// ADC設定（ADC1 レギュラーシーケンス、変換順は電流 → 電圧 → スロットル）
pub mod adc {
    /// 電流センスアンプ出力（PA2 = ADC1_IN3）
    pub const CURRENT_CHANNEL: u8 = 3;

    /// バス電圧分圧（PC1 = ADC1_IN7）
    pub const VOLTAGE_CHANNEL: u8 = 7;

    /// スロットル（PA0 = ADC1_IN1）
    pub const THROTTLE_CHANNEL: u8 = 1;

    /// DMAMUX リクエストID（ADC1）
    pub const DMAMUX_REQUEST_ADC1: u8 = 5;
}

/// Hallセンサー入力（GPIOB）
pub mod hall {
    /// PB6 = H1、PB7 = H2、PB8 = H3
    pub const PINS: [usize; 3] = [6, 7, 8];
}
