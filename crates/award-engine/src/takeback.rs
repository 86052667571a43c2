//! 徽章收回
//!
//! 奖励引擎的伴生算法：重新评估判定函数得到当前仍成立的等级，把用户
//! 持有的、超出该等级的记录逐条删除，并在每次删除前后各发布一次事件。
//!
//! 边界约定（按可观察行为校准）：
//! - `justified_floor`：判定未达成时为 0，否则为解析后的 0 级编号 + 1
//! - `latest_ceiling`：用户最高持有等级（0 编号）+ 1
//! - `latest_ceiling <= justified_floor` 时无可收回
//! - 否则删除 0 编号等级区间 `justified_floor .. latest_ceiling` 的记录
//!
//! 每条删除相互独立，不要求跨等级事务；应存在却查不到的记录视为
//! 已一致的状态，静默跳过而非报错。

use std::collections::HashSet;

use tracing::{debug, info, instrument, warn};

use award_core::{AwardError, AwardRecord, AwardState, BadgeEvent, Result};

use crate::engine::AwardEngine;

impl AwardEngine {
    /// 收回用户不再成立的徽章等级
    ///
    /// `multiple` 徽章不支持收回，直接返回契约错误。返回被删除的记录
    /// （按等级升序），无可收回时为空。
    #[instrument(skip(self, state), fields(kind = %kind))]
    pub async fn possibly_takeback(
        &self,
        kind: &str,
        state: AwardState,
    ) -> Result<Vec<AwardRecord>> {
        let badge = self.definition(kind)?;
        if badge.multiple() {
            return Err(AwardError::TakebackUnsupported {
                kind: kind.to_string(),
            });
        }
        let caller_user = state.user()?;

        let mut state = state;
        // 与发放路径对称, 判定函数不应看到 force_timestamp
        state.take_force_timestamp()?;

        // 重新判定当前仍成立的等级
        let decision = badge.predicate().evaluate(&state).await?;
        let (user, justified_floor) = match decision {
            None => (caller_user, 0),
            Some(decision) => {
                let level = Self::resolve_level(&badge, decision.level)?;
                (decision.user.unwrap_or(caller_user), level + 1)
            }
        };

        let Some(latest) = self.store().latest(&user, badge.kind()).await? else {
            debug!(user_id = %user, "无持有记录, 无可收回");
            return Ok(Vec::new());
        };
        let latest_ceiling = latest.level + 1;
        if latest_ceiling <= justified_floor {
            debug!(
                user_id = %user,
                latest_level = latest.level,
                justified_floor,
                "持有等级未超出当前判定, 无可收回"
            );
            return Ok(Vec::new());
        }

        let mut taken = Vec::new();
        for level in justified_floor..latest_ceiling {
            let found = self
                .store()
                .query(&user, badge.kind(), Some(&HashSet::from([level])))
                .await?;
            let Some(record) = found.into_iter().next() else {
                // 记录缺失视为已一致, 不是数据损坏信号
                warn!(user_id = %user, level, "待收回的记录不存在, 跳过");
                continue;
            };

            self.bus()
                .publish(&BadgeEvent::PreTakeback(record.clone()))
                .await?;
            self.store().delete(&record).await?;
            self.bus()
                .publish(&BadgeEvent::PostTakeback(record.clone()))
                .await?;

            info!(user_id = %user, level, "徽章已收回");
            taken.push(record);
        }
        Ok(taken)
    }
}
