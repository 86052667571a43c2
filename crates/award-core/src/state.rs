//! 评估状态包
//!
//! `possibly_award` / `possibly_takeback` 的入参：一个以 JSON 对象承载的
//! 键值包，必须包含 `user` 字段，可携带 `force_timestamp` 以及任意
//! 徽章特定的业务上下文（只有判定函数会消费后者）。
//!
//! 延迟徽章的状态在入队前通过 [`AwardState::freeze`] 冻结为可序列化的
//! 快照，worker 侧用 [`AwardState::thaw`] 还原后重放同步路径。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AwardError, Result};

/// `awarded_at` 改写字段的键名，判定函数永远看不到该字段
pub const FORCE_TIMESTAMP_KEY: &str = "force_timestamp";

const USER_KEY: &str = "user";

/// 评估状态包
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardState {
    values: Map<String, Value>,
}

impl AwardState {
    /// 以目标用户构建状态包
    pub fn for_user(user: impl Into<String>) -> Self {
        let mut values = Map::new();
        values.insert(USER_KEY.to_string(), Value::String(user.into()));
        Self { values }
    }

    /// 附加一个业务上下文字段（链式调用）
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// 改写 `awarded_at` 时间戳（用于补录历史数据）
    pub fn with_force_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.values
            .insert(FORCE_TIMESTAMP_KEY.to_string(), Value::String(ts.to_rfc3339()));
        self
    }

    /// 提取目标用户，缺失时返回契约错误
    pub fn user(&self) -> Result<String> {
        match self.values.get(USER_KEY) {
            Some(Value::String(user)) => Ok(user.clone()),
            Some(_) => Err(AwardError::InvalidField {
                field: USER_KEY.to_string(),
                message: "必须为字符串".to_string(),
            }),
            None => Err(AwardError::MissingUser),
        }
    }

    /// 读取业务上下文字段
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// 取出并移除 `force_timestamp`
    ///
    /// 在调用判定函数之前执行，保证判定函数只看到业务上下文。
    pub fn take_force_timestamp(&mut self) -> Result<Option<DateTime<Utc>>> {
        let Some(value) = self.values.remove(FORCE_TIMESTAMP_KEY) else {
            return Ok(None);
        };
        let raw = value.as_str().ok_or_else(|| AwardError::InvalidField {
            field: FORCE_TIMESTAMP_KEY.to_string(),
            message: "必须为 RFC3339 字符串".to_string(),
        })?;
        let ts = DateTime::parse_from_rfc3339(raw).map_err(|e| AwardError::InvalidField {
            field: FORCE_TIMESTAMP_KEY.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(ts.with_timezone(&Utc)))
    }

    /// 冻结为可序列化快照，交给延迟派发器
    pub fn freeze(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// 从冻结快照还原
    pub fn thaw(frozen: Value) -> Result<Self> {
        match frozen {
            Value::Object(values) => Ok(Self { values }),
            other => Err(AwardError::InvalidField {
                field: "state".to_string(),
                message: format!("快照必须为 JSON 对象, 实际为 {other}"),
            }),
        }
    }
}
