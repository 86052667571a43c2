//! 奖励引擎共享库
//!
//! 包含奖励引擎各组件共用的领域模型、错误类型、状态包、事件总线以及
//! 存储/通知/延迟派发三个外部协作者接口。

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod notify;
pub mod state;
pub mod store;
pub mod test_utils;

pub use bus::{BadgeEvent, EventBus, EventKind, EventSubscriber};
pub use dispatch::DeferredDispatcher;
pub use error::{AwardError, Result};
pub use models::{AwardDecision, AwardRecord, BadgeLevel};
pub use notify::{LogNotifier, MemoryNotifier, Notifier};
pub use state::{AwardState, FORCE_TIMESTAMP_KEY};
pub use store::{AwardStore, MemoryAwardStore, NewAward};
