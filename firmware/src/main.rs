#![no_std]
#![no_main]

mod fmt;

mod adc_burst;
mod benchmark;
mod config;
mod control_isr;
mod hall_gpio;
mod hardware;
mod motor_driver;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Level, Output, OutputType, Speed},
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
    },
};
use embassy_time::{Delay, Duration, Timer};
use sixstep::{
    CommutationTable, ControlCycle, HallCalibrator, HallReader, PhaseDriver,
};

use adc_burst::AdcBurst;
use fmt::*;
use hall_gpio::HallGpio;
use motor_driver::MotorDriver;
use state::{ControllerStatus, CONTROLLER_STATUS, TELEMETRY};
use tasks::{led_task, telemetry_task, voltage_monitor_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let clock_config = hardware::create_clock_config();
    let p = embassy_stm32::init(clock_config);

    info!("═══════════════════════════════════════════════════════════");
    info!("");
    info!("   ███████╗██╗██╗  ██╗      ███████╗████████╗███████╗██████╗ ");
    info!("   ██╔════╝██║╚██╗██╔╝      ██╔════╝╚══██╔══╝██╔════╝██╔══██╗");
    info!("   ███████╗██║ ╚███╔╝ █████╗███████╗   ██║   █████╗  ██████╔╝");
    info!("   ╚════██║██║ ██╔██╗ ╚════╝╚════██║   ██║   ██╔══╝  ██╔═══╝ ");
    info!("   ███████║██║██╔╝ ██╗      ███████║   ██║   ███████╗██║     ");
    info!("   ╚══════╝╚═╝╚═╝  ╚═╝      ╚══════╝   ╚═╝   ╚══════╝╚═╝     ");
    info!("");
    info!("     Sensored BLDC Six-Step Controller • STM32G431VB @ 170MHz");
    info!("");
    info!("═══════════════════════════════════════════════════════════");

    // LED初期化＆タスク起動（起動失敗時も状態表示できるよう最初に起動）
    let led1 = Output::new(p.PC13, Level::High, Speed::Low);
    let led2 = Output::new(p.PC14, Level::Low, Speed::Low);
    let led3 = Output::new(p.PC15, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(led_task(led1, led2, led3)));

    // 制御エンジン設定の検証
    let ctrl_config = config::controller_config();
    if let Err(e) = ctrl_config.validate() {
        error!("Invalid controller config: {:?}", e);
        *CONTROLLER_STATUS.lock().await = ControllerStatus::ConfigInvalid;
        park().await;
    }
    info!(
        "Config: mode={:?}, identify_halls={}, reverse={}",
        ctrl_config.mode, ctrl_config.identify_halls, ctrl_config.identify_reverse
    );

    // PWM初期化（TIM1、3相補完PWM、センターアライン）
    let pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(p.PE9, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE8, OutputType::PushPull)),
        Some(PwmPin::new(p.PE11, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE10, OutputType::PushPull)),
        Some(PwmPin::new(p.PE13, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE12, OutputType::PushPull)),
        None,
        None,
        config::pwm::FREQUENCY,
        CountingMode::CenterAlignedBothInterrupts,
    );
    let bridges = MotorDriver::new(pwm, config::pwm::DEAD_TIME).into_bridges();
    let mut driver = PhaseDriver::new(bridges);

    // Hall入力初期化
    let mut hall = HallReader::new(unsafe { HallGpio::init() });

    // ADC初期化
    let mut adc = Adc::new(p.ADC1);
    adc.set_sample_time(SampleTime::CYCLES47_5);
    let mut current_ch = p.PA2.degrade_adc();
    let mut voltage_ch = p.PC1.degrade_adc();
    let mut throttle_ch = p.PA0.degrade_adc();

    // 出力オフの状態で電流チャネルのゼロ点を計測
    let mut bias_sum = 0u32;
    for _ in 0..config::ADC_BIAS_OVERSAMPLE {
        bias_sum += adc.blocking_read(&mut current_ch) as u32;
    }
    let adc_bias = (bias_sum / config::ADC_BIAS_OVERSAMPLE) as u16;
    let initial_voltage_mv = adc.blocking_read(&mut voltage_ch) as u32 * ctrl_config.voltage_scale;
    let initial_throttle = adc.blocking_read(&mut throttle_ch);
    info!(
        "ADC: current bias={}, bus voltage={}mV, throttle raw={}",
        adc_bias, initial_voltage_mv, initial_throttle
    );

    // 転流表の決定（Hall同定 or 固定表）
    let table = if ctrl_config.identify_halls {
        *CONTROLLER_STATUS.lock().await = ControllerStatus::Identifying;
        let calibrator = HallCalibrator::new(&ctrl_config);
        info!(
            "Identifying hall sensors ({}ms sweep)...",
            calibrator.sweep_duration_us() / 1_000
        );
        match calibrator
            .calibrate(&mut driver, &mut hall, &mut Delay, ctrl_config.identify_reverse)
            .await
        {
            Ok(table) => table,
            Err(e) => {
                error!(
                    "Hall identification failed: missing={:b}, invalid code seen={}",
                    e.missing,
                    e.saw_invalid_code()
                );
                driver.off();
                *CONTROLLER_STATUS.lock().await = ControllerStatus::CalibrationFailed;
                park().await;
            }
        }
    } else {
        CommutationTable::from_static(ctrl_config.static_table)
    };
    info!("Commutation table: {:?}", table.to_raw());

    // ベンチマーク用サイクルカウンタ
    unsafe {
        benchmark::enable_cycle_counter();
    }

    // 制御エンジンを割り込みコンテキストに登録して起動
    let engine = ControlCycle::new(
        &ctrl_config,
        table,
        AdcBurst::new(adc),
        hall,
        driver,
        adc_bias,
        &TELEMETRY,
    );
    control_isr::install(engine);
    hardware::enable_control_interrupts();
    *CONTROLLER_STATUS.lock().await = ControllerStatus::Running;

    unwrap!(spawner.spawn(telemetry_task()));
    unwrap!(spawner.spawn(voltage_monitor_task(initial_voltage_mv)));

    info!("Six-step control running");

    // メインループ（将来の拡張用）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}

/// 出力オフのまま停止（LEDタスクだけが動き続ける）
async fn park() -> ! {
    loop {
        Timer::after(Duration::from_millis(1_000)).await;
    }
}
