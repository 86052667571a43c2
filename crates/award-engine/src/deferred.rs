//! 队列式延迟派发
//!
//! `DeferredDispatcher` 接口的进程内实现：派发侧把 (kind, 冻结快照)
//! 投入 tokio mpsc 队列，worker 侧消费并用快照重放引擎的同步路径。
//! 单条任务失败只记录日志不中断消费循环，与至少一次语义配合，重放的
//! 幂等性由引擎的发放守卫保证。
//!
//! 生产部署可以用外部队列（Kafka、消息代理）替换本模块，只要实现
//! 同一个 trait 并在消费侧调用 [`AwardEngine::award_frozen`]。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use award_core::{AwardError, DeferredDispatcher, Result};

use crate::engine::AwardEngine;

/// 一条待重放的延迟发放任务
#[derive(Debug, Clone)]
pub struct DeferredAward {
    pub kind: String,
    pub frozen: Value,
}

/// 创建一对派发器与接收端
pub fn deferred_queue() -> (QueueDispatcher, mpsc::UnboundedReceiver<DeferredAward>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueDispatcher { tx }, rx)
}

/// 队列派发器（发送侧）
#[derive(Clone)]
pub struct QueueDispatcher {
    tx: mpsc::UnboundedSender<DeferredAward>,
}

#[async_trait]
impl DeferredDispatcher for QueueDispatcher {
    async fn schedule(&self, kind: &str, frozen: Value) -> Result<()> {
        self.tx
            .send(DeferredAward {
                kind: kind.to_string(),
                frozen,
            })
            .map_err(|e| AwardError::Dispatch(format!("队列已关闭: {e}")))
    }
}

/// 延迟发放 worker（消费侧）
pub struct DeferredWorker {
    engine: Arc<AwardEngine>,
    rx: mpsc::UnboundedReceiver<DeferredAward>,
}

impl DeferredWorker {
    pub fn new(engine: Arc<AwardEngine>, rx: mpsc::UnboundedReceiver<DeferredAward>) -> Self {
        Self { engine, rx }
    }

    /// 启动消费循环，直到收到 shutdown 信号或队列关闭
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("延迟发放 worker 已启动");
        loop {
            tokio::select! {
                task = self.rx.recv() => {
                    let Some(task) = task else { break };
                    if let Err(e) = self.engine.award_frozen(&task.kind, task.frozen).await {
                        // 失败不中断循环, 重试策略属于队列基座而非引擎
                        error!(error = %e, kind = %task.kind, "延迟发放失败");
                    }
                }
                changed = shutdown.changed() => {
                    // 发送端被丢弃也视为停机
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("延迟发放 worker 已停止");
    }
}
