//! 测试工具模块
//!
//! 提供跨 crate 共用的测试数据生成器，保持各测试场景的数据结构一致。

use chrono::{DateTime, Utc};

use crate::models::AwardRecord;
use crate::state::AwardState;

/// 测试数据生成器
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// 携带字数上下文的状态包（配合字数类判定函数使用）
    pub fn word_count_state(user: &str, word_count: u64) -> AwardState {
        AwardState::for_user(user).with("word_count", word_count)
    }

    /// 固定时间点
    pub fn fixed_timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T10:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// 直接构造一条奖励记录（绕过引擎，用于准备存储现场）
    pub fn record(user: &str, kind: &str, level: usize) -> AwardRecord {
        AwardRecord::new(user, kind, level, Self::fixed_timestamp())
    }
}
