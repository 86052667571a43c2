//! 徽章定义
//!
//! 一个徽章定义声明：全局唯一的 kind、有序的等级列表、三个行为开关
//! （`multiple` 可重复发放 / `deferred` 延迟评估 / `award_priors` 自动
//! 补发低等级）、可选的用户消息，以及判定函数本身。定义在进程启动时
//! 构造并注册，之后不再变更；合法性校验只在构造时执行一次。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use award_core::{AwardDecision, AwardError, AwardRecord, AwardState, BadgeLevel, Result};

// ---------------------------------------------------------------------------
// 判定函数
// ---------------------------------------------------------------------------

/// 徽章判定函数
///
/// 输入评估状态，输出应得结论：`None` 表示"尚未达成"，是正常流程而非
/// 错误。判定函数可以读取外部状态，但对持久化必须是纯的——发放动作
/// 永远由引擎执行。
#[async_trait]
pub trait AwardPredicate: Send + Sync {
    async fn evaluate(&self, state: &AwardState) -> Result<Option<AwardDecision>>;
}

/// 用同步闭包实现判定函数的适配器
pub struct FnPredicate<F>(F);

#[async_trait]
impl<F> AwardPredicate for FnPredicate<F>
where
    F: Fn(&AwardState) -> Result<Option<AwardDecision>> + Send + Sync,
{
    async fn evaluate(&self, state: &AwardState) -> Result<Option<AwardDecision>> {
        (self.0)(state)
    }
}

// ---------------------------------------------------------------------------
// 用户消息
// ---------------------------------------------------------------------------

/// 发放成功后要投递给用户的消息
#[derive(Clone)]
pub enum AwardMessage {
    /// 固定文案
    Text(String),
    /// 根据奖励记录渲染文案
    Render(Arc<dyn Fn(&AwardRecord) -> String + Send + Sync>),
}

impl AwardMessage {
    pub fn render(&self, record: &AwardRecord) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Render(f) => f(record),
        }
    }
}

impl fmt::Debug for AwardMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Render(_) => f.write_str("Render(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// 徽章定义
// ---------------------------------------------------------------------------

/// 徽章定义
pub struct BadgeDefinition {
    kind: String,
    levels: Vec<BadgeLevel>,
    multiple: bool,
    deferred: bool,
    award_priors: bool,
    message: Option<AwardMessage>,
    predicate: Arc<dyn AwardPredicate>,
}

impl BadgeDefinition {
    pub fn builder(kind: impl Into<String>) -> BadgeDefinitionBuilder {
        BadgeDefinitionBuilder {
            kind: kind.into(),
            levels: Vec::new(),
            multiple: false,
            deferred: false,
            // 与历史行为保持一致：默认补发低等级
            award_priors: true,
            message: None,
            predicate: None,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn levels(&self) -> &[BadgeLevel] {
        &self.levels
    }

    /// 是否可在同一等级重复发放
    pub fn multiple(&self) -> bool {
        self.multiple
    }

    /// 是否延迟到派发器重放时评估
    pub fn deferred(&self) -> bool {
        self.deferred
    }

    /// 是否自动补发跳过的低等级
    pub fn award_priors(&self) -> bool {
        self.award_priors
    }

    pub fn predicate(&self) -> &Arc<dyn AwardPredicate> {
        &self.predicate
    }

    /// 渲染发放成功时要投递的用户消息
    pub fn user_message(&self, record: &AwardRecord) -> Option<String> {
        self.message.as_ref().map(|m| m.render(record))
    }
}

impl fmt::Debug for BadgeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BadgeDefinition")
            .field("kind", &self.kind)
            .field("levels", &self.levels.len())
            .field("multiple", &self.multiple)
            .field("deferred", &self.deferred)
            .field("award_priors", &self.award_priors)
            .finish()
    }
}

/// 徽章定义构建器
pub struct BadgeDefinitionBuilder {
    kind: String,
    levels: Vec<BadgeLevel>,
    multiple: bool,
    deferred: bool,
    award_priors: bool,
    message: Option<AwardMessage>,
    predicate: Option<Arc<dyn AwardPredicate>>,
}

impl BadgeDefinitionBuilder {
    /// 追加一个等级，裸字符串会被规范化为只有名称的等级
    pub fn level(mut self, level: impl Into<BadgeLevel>) -> Self {
        self.levels.push(level.into());
        self
    }

    /// 批量设置等级
    pub fn levels<I, L>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<BadgeLevel>,
    {
        self.levels.extend(levels.into_iter().map(Into::into));
        self
    }

    /// 标记为可重复发放（仅允许一个等级）
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// 标记为延迟评估
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    /// 关闭低等级补发
    pub fn no_priors(mut self) -> Self {
        self.award_priors = false;
        self
    }

    /// 设置固定文案的用户消息
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(AwardMessage::Text(text.into()));
        self
    }

    /// 设置根据奖励记录渲染的用户消息
    pub fn message_with<F>(mut self, render: F) -> Self
    where
        F: Fn(&AwardRecord) -> String + Send + Sync + 'static,
    {
        self.message = Some(AwardMessage::Render(Arc::new(render)));
        self
    }

    /// 设置判定函数
    pub fn predicate(mut self, predicate: impl AwardPredicate + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// 用同步闭包设置判定函数
    pub fn predicate_fn<F>(self, f: F) -> Self
    where
        F: Fn(&AwardState) -> Result<Option<AwardDecision>> + Send + Sync + 'static,
    {
        self.predicate(FnPredicate(f))
    }

    /// 校验并构建定义
    ///
    /// 校验只在注册期执行一次，发放路径不再重复检查。
    pub fn build(self) -> Result<BadgeDefinition> {
        if self.kind.is_empty() {
            return Err(AwardError::InvalidDefinition(
                "kind 不能为空".to_string(),
            ));
        }
        if self.levels.is_empty() {
            return Err(AwardError::InvalidDefinition(format!(
                "{}: 至少需要一个等级",
                self.kind
            )));
        }
        if self.multiple && self.levels.len() > 1 {
            return Err(AwardError::InvalidDefinition(format!(
                "{}: multiple 徽章只能有一个等级",
                self.kind
            )));
        }
        let predicate = self.predicate.ok_or_else(|| {
            AwardError::InvalidDefinition(format!("{}: 缺少判定函数", self.kind))
        })?;

        Ok(BadgeDefinition {
            kind: self.kind,
            levels: self.levels,
            multiple: self.multiple,
            deferred: self.deferred,
            award_priors: self.award_priors,
            message: self.message,
            predicate,
        })
    }
}
