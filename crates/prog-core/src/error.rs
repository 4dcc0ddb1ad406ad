//! The crate's single public error surface.
//!
//! # 设计背景（Why）
//! - 消息总线、观测器、预测器与配置加载各自会产生互不相同的失败原因，但下游（日志、
//!   故障注入测试、异步包装器的丢弃策略）只需要按照“种类”而非按照“来源模块”分流。
//! - 维持一个扁平的错误枚举，而不是每个模块各自定义错误类型，使得
//!   `AsyncObserver`/`AsyncPredictor` 的丢弃策略可以用一次 `match` 覆盖全部来源。
//!
//! # 契约说明（What）
//! - 六个变体分别对应运行时可能出现的六类失败：配置缺失、越界、数值失败、尺寸不匹配、
//!   不支持的操作、不可达状态。
//! - 每个变体都通过以种类命名的构造函数创建（`ProgError::config_missing(..)` 等），
//!   调用点读起来表达的是意图而不是在摆弄枚举变体。
use std::fmt;

/// The runtime's sole error type, one variant per error kind.
#[derive(Debug, thiserror::Error)]
pub enum ProgError {
    /// A required configuration key was absent, or its value-list length
    /// did not match what the accessor expected.
    #[error("config missing: {message}")]
    ConfigMissing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Trajectory extrapolation, profile exhaustion, or a `UData` accessor
    /// used on the wrong variant.
    #[error("out of range: {message}")]
    OutOfRange { message: String },

    /// Cholesky failure, observer divergence, or a non-finite value in the
    /// state vector.
    #[error("numerical failure: {message}")]
    NumericalFailure { message: String },

    /// A vector crossing a model boundary had the wrong length.
    #[error("size mismatch: {message}")]
    SizeMismatch { message: String },

    /// An operation not implemented by a particular variant (e.g.
    /// `add_load` on a `Const` load estimator).
    #[error("not supported: {message}")]
    NotSupported { message: String },

    /// An internal invariant was violated. Fatal.
    #[error("unreachable: {message}")]
    Unreachable { message: String },
}

impl ProgError {
    pub fn config_missing(message: impl Into<String>) -> Self {
        ProgError::ConfigMissing {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_missing_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ProgError::ConfigMissing {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        ProgError::OutOfRange {
            message: message.into(),
        }
    }

    pub fn numerical_failure(message: impl Into<String>) -> Self {
        ProgError::NumericalFailure {
            message: message.into(),
        }
    }

    pub fn size_mismatch(message: impl Into<String>) -> Self {
        ProgError::SizeMismatch {
            message: message.into(),
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        ProgError::NotSupported {
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        ProgError::Unreachable {
            message: message.into(),
        }
    }

    /// A short, stable tag for the error kind, useful for log fields and
    /// test assertions that don't want to match on the full `Display`
    /// message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProgError::ConfigMissing { .. } => ErrorKind::ConfigMissing,
            ProgError::OutOfRange { .. } => ErrorKind::OutOfRange,
            ProgError::NumericalFailure { .. } => ErrorKind::NumericalFailure,
            ProgError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            ProgError::NotSupported { .. } => ErrorKind::NotSupported,
            ProgError::Unreachable { .. } => ErrorKind::Unreachable,
        }
    }
}

/// The six error kinds, without the attached message/cause. Cheap to
/// `match` on and to compare in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigMissing,
    OutOfRange,
    NumericalFailure,
    SizeMismatch,
    NotSupported,
    Unreachable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ConfigMissing => "config_missing",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::NumericalFailure => "numerical_failure",
            ErrorKind::SizeMismatch => "size_mismatch",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, ProgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_constructor() {
        assert_eq!(ProgError::config_missing("x").kind(), ErrorKind::ConfigMissing);
        assert_eq!(ProgError::out_of_range("x").kind(), ErrorKind::OutOfRange);
        assert_eq!(
            ProgError::numerical_failure("x").kind(),
            ErrorKind::NumericalFailure
        );
        assert_eq!(ProgError::size_mismatch("x").kind(), ErrorKind::SizeMismatch);
        assert_eq!(ProgError::not_supported("x").kind(), ErrorKind::NotSupported);
        assert_eq!(ProgError::unreachable("x").kind(), ErrorKind::Unreachable);
    }

    #[test]
    fn display_includes_message() {
        let err = ProgError::out_of_range("t past last waypoint");
        assert!(err.to_string().contains("t past last waypoint"));
    }
}
