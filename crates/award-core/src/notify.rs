//! 用户通知接口
//!
//! 引擎只依赖 `Notifier` trait，消息如何渲染、走哪个渠道由外部实现决定。
//! 当前提供两个实现：`LogNotifier` 模拟投递（仅记录日志），便于在无
//! 外部依赖的情况下验证事件链路；`MemoryNotifier` 供测试断言投递内容。

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::error::Result;

/// 通知投递接口
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, user: &str, message: &str) -> Result<()>;
}

/// 模拟投递的通知器
///
/// 生产环境中替换为 APP 推送 / 短信等真实渠道的实现
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, user: &str, message: &str) -> Result<()> {
        info!(user_id = %user, message = %message, "模拟投递徽章消息");
        Ok(())
    }
}

/// 记录所有投递内容的通知器，用于测试断言
#[derive(Default)]
pub struct MemoryNotifier {
    delivered: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已投递的 (user, message) 列表
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn deliver(&self, user: &str, message: &str) -> Result<()> {
        self.delivered
            .lock()
            .push((user.to_string(), message.to_string()));
        Ok(())
    }
}
