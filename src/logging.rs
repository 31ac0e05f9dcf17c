// ==========================================
// 家具生产引擎 - 日志输出
// ==========================================
// 调度/台账/日产出引擎的 tracing 事件统一经此输出
// 默认只放行本 crate 的 info 与其他 crate 的 warn
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时的过滤规则
pub const DEFAULT_FILTER: &str = "furniture_production=info,warn";

/// JSON 输出开关的环境变量
pub const LOG_JSON_ENV: &str = "FURNITURE_LOG_JSON";

/// 安装全局 subscriber
///
/// - RUST_LOG 覆盖 [`DEFAULT_FILTER`], 例如 `RUST_LOG=furniture_production::engine=debug`
/// - `FURNITURE_LOG_JSON=1` 时逐行输出 JSON, 供日志采集
///
/// 已安装过 subscriber 时静默跳过
///
/// ```no_run
/// furniture_production::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(LOG_JSON_ENV)
        .map(|v| json_enabled(&v))
        .unwrap_or(false);

    let installed = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("日志 subscriber 已存在, 跳过初始化");
    }
}

/// 集成测试用: debug 级别, 输出随测试捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("furniture_production=debug"))
        .with_test_writer()
        .try_init();
}

fn json_enabled(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_switch_values() {
        assert!(json_enabled("1"));
        assert!(json_enabled(" TRUE "));
        assert!(!json_enabled("0"));
        assert!(!json_enabled(""));
    }
}
