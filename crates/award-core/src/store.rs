//! 奖励记录存储
//!
//! `AwardStore` 是引擎唯一的持久化边界。实现方必须保证：对要求唯一的
//! 插入（非 multiple 徽章），(user, kind, level) 上存在唯一约束，并发
//! 重复插入时第二个请求返回 `DuplicateAward`——引擎会把它当作"已发放"
//! 静默处理，这是并发正确性的兜底。
//!
//! 内置的 `MemoryAwardStore` 基于 DashMap，按 (user, kind) 分桶加锁，
//! 天然满足上述唯一约束，用于测试和单进程部署。

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::{AwardError, Result};
use crate::models::AwardRecord;

// ---------------------------------------------------------------------------
// 存储接口
// ---------------------------------------------------------------------------

/// 待创建的奖励记录
#[derive(Debug, Clone)]
pub struct NewAward {
    pub user: String,
    pub kind: String,
    /// 0 开始编号
    pub level: usize,
    /// 为空时由存储方填充当前时间
    pub awarded_at: Option<DateTime<Utc>>,
    /// 是否要求 (user, kind, level) 唯一；multiple 徽章置为 false
    pub unique: bool,
}

impl NewAward {
    pub fn new(user: impl Into<String>, kind: impl Into<String>, level: usize) -> Self {
        Self {
            user: user.into(),
            kind: kind.into(),
            level,
            awarded_at: None,
            unique: true,
        }
    }

    pub fn awarded_at(mut self, ts: Option<DateTime<Utc>>) -> Self {
        self.awarded_at = ts;
        self
    }

    pub fn allow_repeat(mut self) -> Self {
        self.unique = false;
        self
    }
}

/// 奖励记录存储接口
#[async_trait]
pub trait AwardStore: Send + Sync {
    /// 创建记录；`unique` 插入遇到重复时必须返回 `DuplicateAward`
    async fn create(&self, award: NewAward) -> Result<AwardRecord>;

    /// 查询用户在某徽章下的记录，`levels` 为空表示不过滤等级
    async fn query(
        &self,
        user: &str,
        kind: &str,
        levels: Option<&HashSet<usize>>,
    ) -> Result<Vec<AwardRecord>>;

    /// 用户在某徽章下的最高等级记录
    async fn latest(&self, user: &str, kind: &str) -> Result<Option<AwardRecord>>;

    /// 删除记录；记录不存在时应幂等返回成功
    async fn delete(&self, record: &AwardRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// 内存存储实现
// ---------------------------------------------------------------------------

/// 基于 DashMap 的内存存储
#[derive(Default)]
pub struct MemoryAwardStore {
    // (user, kind) -> 该用户在该徽章下的全部记录
    records: DashMap<(String, String), Vec<AwardRecord>>,
}

impl MemoryAwardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前记录总数
    pub fn len(&self) -> usize {
        self.records.iter().map(|bucket| bucket.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AwardStore for MemoryAwardStore {
    async fn create(&self, award: NewAward) -> Result<AwardRecord> {
        let key = (award.user.clone(), award.kind.clone());
        // entry 持有分桶写锁，检查与插入构成一个原子步骤
        let mut bucket = self.records.entry(key).or_default();
        if award.unique && bucket.iter().any(|r| r.level == award.level) {
            return Err(AwardError::DuplicateAward {
                user: award.user,
                kind: award.kind,
                level: award.level,
            });
        }

        let record = AwardRecord::new(
            award.user,
            award.kind,
            award.level,
            award.awarded_at.unwrap_or_else(Utc::now),
        );
        bucket.push(record.clone());
        Ok(record)
    }

    async fn query(
        &self,
        user: &str,
        kind: &str,
        levels: Option<&HashSet<usize>>,
    ) -> Result<Vec<AwardRecord>> {
        let Some(bucket) = self.records.get(&(user.to_string(), kind.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(bucket
            .iter()
            .filter(|r| levels.is_none_or(|set| set.contains(&r.level)))
            .cloned()
            .collect())
    }

    async fn latest(&self, user: &str, kind: &str) -> Result<Option<AwardRecord>> {
        let Some(bucket) = self.records.get(&(user.to_string(), kind.to_string())) else {
            return Ok(None);
        };
        Ok(bucket.iter().max_by_key(|r| r.level).cloned())
    }

    async fn delete(&self, record: &AwardRecord) -> Result<()> {
        let key = (record.user.clone(), record.kind.clone());
        let Some(mut bucket) = self.records.get_mut(&key) else {
            debug!(record_id = %record.id, "删除的记录不存在, 幂等返回");
            return Ok(());
        };
        let before = bucket.len();
        bucket.retain(|r| r.id != record.id);
        if bucket.len() == before {
            debug!(record_id = %record.id, "删除的记录不存在, 幂等返回");
        }
        Ok(())
    }
}
