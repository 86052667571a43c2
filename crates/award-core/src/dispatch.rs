//! 延迟派发接口
//!
//! 延迟徽章（`deferred`）的 `possibly_award` 不在调用方路径上评估判定，
//! 而是把冻结后的状态快照交给派发器，由某个执行基座（线程池、外部
//! 队列、消息代理）稍后以至少一次语义重放引擎的同步路径。引擎对
//! 基座本身一无所知，只依赖这个接口。

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// 延迟派发接口
///
/// 实现方必须保证：入队的 (kind, frozen) 最终会以完全相同的快照驱动
/// 引擎的同步路径，至少一次。重放幂等性由引擎的发放守卫和存储的唯一
/// 约束保证，派发器不需要去重。
#[async_trait]
pub trait DeferredDispatcher: Send + Sync {
    async fn schedule(&self, kind: &str, frozen: Value) -> Result<()>;
}
