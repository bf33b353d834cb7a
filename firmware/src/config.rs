//! Configuration module
//!
//! ボード固有の定数と、制御エンジンに渡す `ControllerConfig` の組み立てを提供します。
//! 設定はビルド時に固定され、フラッシュへの永続化は行いません。

pub mod params;

// params.rsから主要な定数を再エクスポート
pub use params::*;

use sixstep::ControllerConfig;

/// このボード向けの制御エンジン設定を生成
///
/// 制御則の定数は `sixstep::config` のデフォルト値（リファレンスボード値）を使い、
/// Hall同定の有無と回転方向だけをボード設定で上書きします。
pub fn controller_config() -> ControllerConfig {
    let mut config = ControllerConfig::new();
    config.mode = CONTROL_MODE;
    config.identify_halls = IDENTIFY_HALLS;
    config.identify_reverse = IDENTIFY_REVERSE;
    config.static_table = STATIC_COMMUTATION_TABLE;
    config
}
