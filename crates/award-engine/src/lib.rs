//! 奖励引擎
//!
//! 给定用户与一份应用状态快照，判断其是否获得某徽章、获得哪个等级，
//! 恰好一次地持久化该奖励，按需补发被跳过的低等级，并能收回不再成立
//! 的奖励。
//!
//! ## 模块结构
//!
//! - `badge`: 徽章定义、判定函数接口与注册期校验
//! - `registry`: 线程安全的徽章注册表
//! - `engine`: 发放与补发算法
//! - `takeback`: 收回算法
//! - `messenger`: 默认的用户消息订阅者
//! - `deferred`: 队列式延迟派发器与消费 worker
//!
//! ## 使用示例
//!
//! ```ignore
//! let registry = Arc::new(BadgeRegistry::new());
//! registry.register(
//!     BadgeDefinition::builder("ten-words")
//!         .levels(["青铜", "白银", "黄金"])
//!         .predicate_fn(|state| { /* 按 state 判定等级 */ })
//!         .build()?,
//! )?;
//!
//! let engine = AwardEngine::new(registry, Arc::new(MemoryAwardStore::new()));
//! let record = engine
//!     .possibly_award("ten-words", AwardState::for_user("user-001"))
//!     .await?;
//! ```

pub mod badge;
pub mod deferred;
pub mod engine;
pub mod messenger;
pub mod registry;
pub mod takeback;

pub use badge::{AwardMessage, AwardPredicate, BadgeDefinition, BadgeDefinitionBuilder};
pub use deferred::{DeferredAward, DeferredWorker, QueueDispatcher, deferred_queue};
pub use engine::AwardEngine;
pub use messenger::BadgeMessenger;
pub use registry::BadgeRegistry;

pub use award_core::{
    AwardDecision, AwardError, AwardRecord, AwardState, AwardStore, BadgeEvent, BadgeLevel,
    DeferredDispatcher, EventBus, EventKind, EventSubscriber, FORCE_TIMESTAMP_KEY, LogNotifier,
    MemoryAwardStore, MemoryNotifier, NewAward, Notifier, Result,
};
