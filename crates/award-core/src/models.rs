//! 领域模型定义
//!
//! 奖励引擎的三个核心数据结构：
//! - `BadgeLevel`：徽章单个等级的展示信息，构造后不可变
//! - `AwardRecord`：一次奖励的持久化记录，创建后不可变，只能被收回（删除）
//! - `AwardDecision`：判定函数的瞬时输出，只在一次评估调用内存活

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BadgeLevel — 徽章等级
// ---------------------------------------------------------------------------

/// 徽章的单个等级
///
/// 等级在定义中的位置即进阶顺序：内部从 0 开始编号，判定结果对外使用
/// 从 1 开始的编号。仅携带展示信息，发放条件由判定函数决定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeLevel {
    pub name: String,
    pub description: String,
    /// 图标资源引用（如 CDN 路径），可为空
    pub logo: Option<String>,
}

impl BadgeLevel {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        logo: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            logo,
        }
    }
}

// 裸字符串规范化为只有名称的等级，注册时即可写 `levels(["青铜", "白银"])`
impl From<&str> for BadgeLevel {
    fn from(name: &str) -> Self {
        Self::new(name, "", None)
    }
}

impl From<String> for BadgeLevel {
    fn from(name: String) -> Self {
        Self::new(name, "", None)
    }
}

// ---------------------------------------------------------------------------
// AwardRecord — 奖励记录
// ---------------------------------------------------------------------------

/// 已发放的奖励记录
///
/// 对应存储中的一行 (user, kind, level, awarded_at)。记录创建后不再修改，
/// 收回徽章时整条删除。`id` 采用 UUID v7，时间有序便于索引和追踪。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardRecord {
    pub id: String,
    pub user: String,
    pub kind: String,
    /// 0 开始编号，对应徽章定义中等级列表的下标
    pub level: usize,
    pub awarded_at: DateTime<Utc>,
}

impl AwardRecord {
    /// 构建新记录，自动生成 UUID v7 作为 id
    pub fn new(
        user: impl Into<String>,
        kind: impl Into<String>,
        level: usize,
        awarded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user: user.into(),
            kind: kind.into(),
            level,
            awarded_at,
        }
    }
}

// ---------------------------------------------------------------------------
// AwardDecision — 判定结果
// ---------------------------------------------------------------------------

/// 判定函数的输出
///
/// - `level`：从 1 开始编号的应得等级；`None` 表示"该徽章唯一的等级"，
///   仅对单等级徽章合法
/// - `user`：改写奖励目标用户；`None` 表示使用调用方提供的用户
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwardDecision {
    pub level: Option<usize>,
    pub user: Option<String>,
}

impl AwardDecision {
    /// 判定通过，发放单等级徽章（或由调用方用户获得）
    pub fn earned() -> Self {
        Self::default()
    }

    /// 判定通过，发放指定等级（从 1 开始编号）
    pub fn at_level(level: usize) -> Self {
        Self {
            level: Some(level),
            user: None,
        }
    }

    /// 改写奖励目标用户
    pub fn for_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}
