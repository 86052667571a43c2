//! 进程内事件总线
//!
//! 同步、有序的发布机制：每种事件类型维护独立的订阅者列表，发布时在
//! 发布方的任务上按注册顺序逐个调用。订阅者失败会原样传播给发布方，
//! 不做隔离，也不做排队和持久化。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::models::AwardRecord;

// ---------------------------------------------------------------------------
// 事件模型
// ---------------------------------------------------------------------------

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// 奖励记录已持久化
    Awarded,
    /// 即将删除一条奖励记录
    PreTakeback,
    /// 已删除一条奖励记录
    PostTakeback,
}

/// 徽章事件
///
/// 发布 `Awarded` 时记录已经落库，订阅者观察到的是持久化之后的状态；
/// `PreTakeback` / `PostTakeback` 分别在删除前后各发布一次。
#[derive(Debug, Clone)]
pub enum BadgeEvent {
    Awarded(AwardRecord),
    PreTakeback(AwardRecord),
    PostTakeback(AwardRecord),
}

impl BadgeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Awarded(_) => EventKind::Awarded,
            Self::PreTakeback(_) => EventKind::PreTakeback,
            Self::PostTakeback(_) => EventKind::PostTakeback,
        }
    }

    /// 事件关联的奖励记录
    pub fn record(&self) -> &AwardRecord {
        match self {
            Self::Awarded(r) | Self::PreTakeback(r) | Self::PostTakeback(r) => r,
        }
    }
}

// ---------------------------------------------------------------------------
// 订阅者与总线
// ---------------------------------------------------------------------------

/// 事件订阅者
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn on_event(&self, event: &BadgeEvent) -> Result<()>;
}

/// 进程内事件总线
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventSubscriber>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册订阅者，同一事件类型按注册顺序被调用
    pub fn subscribe(&self, kind: EventKind, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push(subscriber);
    }

    /// 发布事件
    ///
    /// 订阅者在发布方任务上顺序执行，任何一个失败都会中断后续订阅者
    /// 并把错误传播给发布方。
    pub async fn publish(&self, event: &BadgeEvent) -> Result<()> {
        // 不能跨 await 持锁，先克隆出快照
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self
            .subscribers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for subscriber in subscribers {
            subscriber.on_event(event).await?;
        }
        Ok(())
    }
}
