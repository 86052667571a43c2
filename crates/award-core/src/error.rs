//! 统一错误处理模块
//!
//! 定义奖励引擎的完整错误分类，使用 thiserror 提供良好的错误信息。
//! 分为四大类：契约错误（调用方违反前置条件）、配置错误（注册期的
//! 非法徽章定义）、存储错误、派发/投递错误。

use thiserror::Error;

/// 奖励引擎错误类型
#[derive(Debug, Error)]
pub enum AwardError {
    // ==================== 契约错误 ====================
    #[error("状态缺少 user 字段")]
    MissingUser,

    #[error("状态字段无效: {field} - {message}")]
    InvalidField { field: String, message: String },

    #[error("多级徽章的判定结果必须携带等级: {kind}")]
    LevelRequired { kind: String },

    #[error("等级超出范围: {kind} level={level}, 共 {count} 级")]
    LevelOutOfRange {
        kind: String,
        level: usize,
        count: usize,
    },

    #[error("multiple 徽章不支持收回: {kind}")]
    TakebackUnsupported { kind: String },

    // ==================== 配置错误 ====================
    #[error("徽章定义无效: {0}")]
    InvalidDefinition(String),

    #[error("徽章类型已注册: {0}")]
    DuplicateKind(String),

    #[error("徽章类型未注册: {0}")]
    UnknownKind(String),

    // ==================== 存储错误 ====================
    #[error("奖励记录已存在: user={user} kind={kind} level={level}")]
    DuplicateAward {
        user: String,
        kind: String,
        level: usize,
    },

    #[error("存储错误: {0}")]
    Store(String),

    // ==================== 判定与派发错误 ====================
    #[error("判定执行失败: {kind} - {message}")]
    Predicate { kind: String, message: String },

    #[error("延迟派发失败: {0}")]
    Dispatch(String),

    #[error("通知投递失败: {0}")]
    Notify(String),

    #[error("状态快照无效: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, AwardError>;

impl AwardError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingUser => "MISSING_USER",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::LevelRequired { .. } => "LEVEL_REQUIRED",
            Self::LevelOutOfRange { .. } => "LEVEL_OUT_OF_RANGE",
            Self::TakebackUnsupported { .. } => "TAKEBACK_UNSUPPORTED",
            Self::InvalidDefinition(_) => "INVALID_DEFINITION",
            Self::DuplicateKind(_) => "DUPLICATE_KIND",
            Self::UnknownKind(_) => "UNKNOWN_KIND",
            Self::DuplicateAward { .. } => "DUPLICATE_AWARD",
            Self::Store(_) => "STORE_ERROR",
            Self::Predicate { .. } => "PREDICATE_ERROR",
            Self::Dispatch(_) => "DISPATCH_ERROR",
            Self::Notify(_) => "NOTIFY_ERROR",
            Self::Snapshot(_) => "SNAPSHOT_ERROR",
        }
    }

    /// 是否为调用方契约错误
    ///
    /// 契约错误对本次调用是致命的，引擎不会重试，也不应被吞掉。
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            Self::MissingUser
                | Self::InvalidField { .. }
                | Self::LevelRequired { .. }
                | Self::LevelOutOfRange { .. }
                | Self::TakebackUnsupported { .. }
        )
    }

    /// 是否为注册期配置错误
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidDefinition(_) | Self::DuplicateKind(_)
        )
    }
}
