//! 日志初始化

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

/// 默认过滤指令（匹配所有 `rci_*` crate）
pub const DEFAULT_LOG_DIRECTIVE: &str = "rci=info";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// 安装全局 tracing subscriber
///
/// `RUST_LOG` 优先，未设置时使用 [`DEFAULT_LOG_DIRECTIVE`]。
/// 同时把 `log` crate 的记录桥接到 tracing。
///
/// 只有第一次调用生效并返回 `true`；之后的调用（或已有其他全局 subscriber 时）
/// 返回 `false`。
pub fn init_logging() -> bool {
    init_logging_with(DEFAULT_LOG_DIRECTIVE)
}

/// 同 [`init_logging`]，指定默认过滤指令
pub fn init_logging_with(default_directive: &str) -> bool {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return false;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init()
    {
        tracing::debug!(%err, "log bridge not installed");
    }
    true
}
