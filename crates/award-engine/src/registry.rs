//! 徽章注册表
//!
//! 使用 DashMap 提供线程安全的徽章定义索引。注册表在进程启动时构造并
//! 填充，之后以引用传入引擎——不存在进程级的隐式全局状态。

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument};

use award_core::{AwardError, Result};

use crate::badge::BadgeDefinition;

/// 徽章注册表
#[derive(Default)]
pub struct BadgeRegistry {
    badges: DashMap<String, Arc<BadgeDefinition>>,
}

impl BadgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册徽章定义，kind 重复时返回配置错误
    #[instrument(skip(self, badge), fields(kind = %badge.kind()))]
    pub fn register(&self, badge: BadgeDefinition) -> Result<()> {
        let kind = badge.kind().to_string();
        if self.badges.contains_key(&kind) {
            return Err(AwardError::DuplicateKind(kind));
        }
        self.badges.insert(kind.clone(), Arc::new(badge));
        info!("徽章已注册: {}", kind);
        Ok(())
    }

    /// 获取徽章定义
    pub fn get(&self, kind: &str) -> Option<Arc<BadgeDefinition>> {
        self.badges.get(kind).map(|b| b.value().clone())
    }

    /// 检查徽章是否已注册
    pub fn contains(&self, kind: &str) -> bool {
        self.badges.contains_key(kind)
    }

    /// 已注册的徽章数量
    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    /// 所有已注册的 kind
    pub fn kinds(&self) -> Vec<String> {
        self.badges.iter().map(|b| b.key().clone()).collect()
    }
}
