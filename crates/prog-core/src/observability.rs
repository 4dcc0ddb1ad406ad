//! Thin `tracing` wiring: a CLI/test-harness subscriber installer.
//!
//! # 设计背景（Why）
//! - `spec.md` §7 的"用户可见失败行为"要求丢弃是静默的——调用方看不到 `Result`
//!   错误。但"静默"不等于"不可观测"：`SPEC_FULL.md` §4.12 要求每一次丢弃都在
//!   `tracing` 上留痕，所以丢弃路径本身仍在各模块里直接调用 `tracing::warn!`。
//! - 这个模块只负责一件边车事务：给 CLI/集成测试一个一次性的订阅器安装入口。
//!   日志字段名（`source`/`id`/`error`）由各调用点直接写成字面量标识符，因为
//!   `tracing` 的结构化字段语法要求字段名是编译期标识符，不能来自运行时字符
//!   串常量；字段名的一致性约定记录在各调用点的注释里，而不是集中成常量。
//! - 纯数值方程（`SystemModel::state_eqn` 等）不在这里插桩，保持它们可以在
//!   没有任何 tracing 订阅器的情况下被独立单元测试和基准测试。
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Idempotent: a second call is a no-op rather than a panic, since both the
/// CLI harness and individual integration tests may each want to guarantee
/// a subscriber is present without coordinating who calls this first.
pub fn install_default_subscriber() {
    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        // `set_global_default` fails only if a subscriber is already
        // installed (e.g. by a test harness) — that's fine, not an error.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
