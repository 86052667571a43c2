//! 默认消息订阅者
//!
//! 引擎内置的唯一订阅者：监听发放事件，若徽章定义声明了用户消息
//! （固定文案或按记录渲染的函数），通过通知器投递给获奖用户。
//! 未声明消息的徽章静默跳过。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use award_core::{BadgeEvent, EventSubscriber, Notifier, Result};

use crate::registry::BadgeRegistry;

/// 徽章消息投递订阅者
pub struct BadgeMessenger {
    registry: Arc<BadgeRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl BadgeMessenger {
    pub fn new(registry: Arc<BadgeRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self { registry, notifier }
    }
}

#[async_trait]
impl EventSubscriber for BadgeMessenger {
    async fn on_event(&self, event: &BadgeEvent) -> Result<()> {
        let BadgeEvent::Awarded(record) = event else {
            return Ok(());
        };
        let Some(badge) = self.registry.get(&record.kind) else {
            // 记录存在但定义已不在注册表, 只可能发生在注册表被换掉之后
            warn!(kind = %record.kind, "发放事件对应的徽章未注册, 跳过消息投递");
            return Ok(());
        };
        if let Some(message) = badge.user_message(record) {
            self.notifier.deliver(&record.user, &message).await?;
        }
        Ok(())
    }
}
