//! 奖励引擎
//!
//! 核心算法：对照状态包评估徽章判定函数，持久化新的奖励记录，按需
//! 补发低等级，并围绕状态变更发布事件。延迟徽章在这里冻结状态并交给
//! 派发器，评估推迟到派发器重放时进行。
//!
//! 并发模型：引擎单次调用内是顺序执行的，挂起点只出现在存储边界和
//! 派发入队处。发放守卫（查重后写入）在并发调用下存在竞态窗口，由
//! 存储的 (user, kind, level) 唯一约束兜底，引擎把唯一约束冲突当作
//! "已发放"静默处理。

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use award_core::{
    AwardError, AwardRecord, AwardState, AwardStore, BadgeEvent, DeferredDispatcher, EventBus,
    EventKind, EventSubscriber, NewAward, Notifier, Result,
};

use crate::badge::BadgeDefinition;
use crate::messenger::BadgeMessenger;
use crate::registry::BadgeRegistry;

/// 奖励引擎
///
/// 注册表、存储、总线在构造时注入；延迟派发器与通知器可选。
/// 引擎自身无状态，可以放入 `Arc` 被多个调用方并发使用。
pub struct AwardEngine {
    registry: Arc<BadgeRegistry>,
    store: Arc<dyn AwardStore>,
    bus: EventBus,
    dispatcher: Option<Arc<dyn DeferredDispatcher>>,
}

impl AwardEngine {
    pub fn new(registry: Arc<BadgeRegistry>, store: Arc<dyn AwardStore>) -> Self {
        Self {
            registry,
            store,
            bus: EventBus::new(),
            dispatcher: None,
        }
    }

    /// 配置延迟派发器；未配置时延迟徽章的发放会失败
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn DeferredDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// 配置通知器并挂上默认订阅者：发放成功后投递徽章定义声明的用户消息
    pub fn with_notifier(self, notifier: Arc<dyn Notifier>) -> Self {
        self.bus.subscribe(
            EventKind::Awarded,
            Arc::new(BadgeMessenger::new(self.registry.clone(), notifier)),
        );
        self
    }

    /// 注册额外的事件订阅者
    pub fn subscribe(&self, kind: EventKind, subscriber: Arc<dyn EventSubscriber>) {
        self.bus.subscribe(kind, subscriber);
    }

    pub fn registry(&self) -> &Arc<BadgeRegistry> {
        &self.registry
    }

    pub(crate) fn store(&self) -> &Arc<dyn AwardStore> {
        &self.store
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub(crate) fn definition(&self, kind: &str) -> Result<Arc<BadgeDefinition>> {
        self.registry
            .get(kind)
            .ok_or_else(|| AwardError::UnknownKind(kind.to_string()))
    }

    /// 评估是否应向用户发放徽章
    ///
    /// 延迟徽章只冻结状态并入队，调用方路径上没有任何副作用；
    /// 其余徽章立即走同步路径，返回新建的记录（未达成或已持有时为 `None`）。
    #[instrument(skip(self, state), fields(kind = %kind))]
    pub async fn possibly_award(&self, kind: &str, state: AwardState) -> Result<Option<AwardRecord>> {
        let badge = self.definition(kind)?;
        // 契约检查先于入队，缺 user 的状态不应进入队列
        state.user()?;

        if badge.deferred() {
            let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
                AwardError::Dispatch(format!("{kind}: 未配置延迟派发器"))
            })?;
            dispatcher.schedule(kind, state.freeze()).await?;
            debug!("延迟徽章已入队");
            return Ok(None);
        }

        self.evaluate_and_award(&badge, state).await
    }

    /// 用冻结快照重放同步路径
    ///
    /// 派发器的消费侧入口。派发器按至少一次语义投递，重放的幂等性由
    /// 发放守卫与存储唯一约束保证。
    #[instrument(skip(self, frozen), fields(kind = %kind))]
    pub async fn award_frozen(&self, kind: &str, frozen: Value) -> Result<Option<AwardRecord>> {
        let badge = self.definition(kind)?;
        self.evaluate_and_award(&badge, AwardState::thaw(frozen)?).await
    }

    /// 同步发放路径
    async fn evaluate_and_award(
        &self,
        badge: &BadgeDefinition,
        mut state: AwardState,
    ) -> Result<Option<AwardRecord>> {
        let caller_user = state.user()?;
        // 判定函数永远看不到 force_timestamp
        let force_timestamp = state.take_force_timestamp()?;

        let Some(decision) = badge.predicate().evaluate(&state).await? else {
            debug!(user_id = %caller_user, "尚未达成, 不发放");
            return Ok(None);
        };

        let user = decision.user.unwrap_or(caller_user);
        let level = Self::resolve_level(badge, decision.level)?;

        // 发放守卫：非 multiple 徽章同一等级只发一次
        if !badge.multiple() {
            let held = self
                .store
                .query(&user, badge.kind(), Some(&HashSet::from([level])))
                .await?;
            if !held.is_empty() {
                debug!(user_id = %user, level, "已持有该等级, 跳过");
                return Ok(None);
            }
        }

        let new_award = NewAward::new(&user, badge.kind(), level).awarded_at(force_timestamp);
        let new_award = if badge.multiple() {
            new_award.allow_repeat()
        } else {
            new_award
        };
        let record = match self.store.create(new_award).await {
            Ok(record) => record,
            // 并发竞态下唯一约束兜底, 第二个写入者视为已发放
            Err(AwardError::DuplicateAward { .. }) => {
                debug!(user_id = %user, level, "并发写入冲突, 视为已发放");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        info!(user_id = %user, level, "徽章已发放");
        // 订阅者观察到的记录已经落库
        self.bus.publish(&BadgeEvent::Awarded(record.clone())).await?;

        if badge.award_priors() && !badge.multiple() {
            self.award_priors(badge, &user, level, force_timestamp).await?;
        }

        Ok(Some(record))
    }

    /// 解析判定结果中的等级
    ///
    /// 对外等级从 1 开始编号，入库前转为 0 开始；`None` 只对单等级徽章
    /// 合法，固定解析为第 1 级。
    pub(crate) fn resolve_level(
        badge: &BadgeDefinition,
        decision_level: Option<usize>,
    ) -> Result<usize> {
        let level = match decision_level {
            Some(level) => level,
            None => {
                if badge.levels().len() != 1 {
                    return Err(AwardError::LevelRequired {
                        kind: badge.kind().to_string(),
                    });
                }
                1
            }
        };
        if level == 0 || level > badge.levels().len() {
            return Err(AwardError::LevelOutOfRange {
                kind: badge.kind().to_string(),
                level,
                count: badge.levels().len(),
            });
        }
        Ok(level - 1)
    }

    /// 补发跳过的低等级
    ///
    /// 候选集为 `0..level` 中用户尚未持有的等级，按升序逐个创建并发布
    /// 事件。补发不重新调用判定函数——低等级的成立完全由"已获得等级
    /// level"这一事实推出。
    async fn award_priors(
        &self,
        badge: &BadgeDefinition,
        user: &str,
        level: usize,
        force_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        if level == 0 {
            return Ok(());
        }

        let candidates: HashSet<usize> = (0..level).collect();
        let held: HashSet<usize> = self
            .store
            .query(user, badge.kind(), Some(&candidates))
            .await?
            .into_iter()
            .map(|r| r.level)
            .collect();

        let mut missing: Vec<usize> = candidates.difference(&held).copied().collect();
        // 升序补发, 让订阅者观察到确定的顺序
        missing.sort_unstable();

        for prior in missing {
            let record = match self
                .store
                .create(NewAward::new(user, badge.kind(), prior).awarded_at(force_timestamp))
                .await
            {
                Ok(record) => record,
                // 并发补发同一等级时让先到者生效
                Err(AwardError::DuplicateAward { .. }) => continue,
                Err(e) => return Err(e),
            };
            info!(user_id = %user, level = prior, "补发低等级徽章");
            self.bus.publish(&BadgeEvent::Awarded(record)).await?;
        }
        Ok(())
    }
}
