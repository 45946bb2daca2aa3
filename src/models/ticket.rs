use crate::entities::{TicketType, ticket_entity};
use crate::error::{AppError, AppResult};
use crate::models::{CommentThread, LabelResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

pub const TITLE_MAX_LEN: usize = 100;

/// 可设置的生命周期阶段，严格按此顺序推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Approved,
    Doing,
    Done,
}

impl Stage {
    pub const ORDER: [Stage; 3] = [Stage::Approved, Stage::Doing, Stage::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Approved => "approved",
            Stage::Doing => "doing",
            Stage::Done => "done",
        }
    }

    /// 在此阶段之前的所有阶段
    pub fn predecessors(&self) -> &'static [Stage] {
        let idx = Stage::ORDER
            .iter()
            .position(|s| s == self)
            .unwrap_or_default();
        &Stage::ORDER[..idx]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ORDER
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| AppError::ValidationError(format!("Unknown status: {s}")))
    }
}

/// 由时间戳推导出的当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    AwaitingApproval,
    Approved,
    Doing,
    Done,
}

impl TicketStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::AwaitingApproval => "Awaiting Approval",
            TicketStatus::Approved => "Approved",
            TicketStatus::Doing => "Doing",
            TicketStatus::Done => "Done",
        }
    }
}

impl From<Stage> for TicketStatus {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Approved => TicketStatus::Approved,
            Stage::Doing => TicketStatus::Doing,
            Stage::Done => TicketStatus::Done,
        }
    }
}

/// 工单的三个阶段时间戳
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimeline {
    pub approved_at: Option<DateTime<Utc>>,
    pub doing_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
}

impl StageTimeline {
    pub fn get(&self, stage: Stage) -> Option<DateTime<Utc>> {
        match stage {
            Stage::Approved => self.approved_at,
            Stage::Doing => self.doing_at,
            Stage::Done => self.done_at,
        }
    }

    fn set(&mut self, stage: Stage, at: DateTime<Utc>) {
        let slot = match stage {
            Stage::Approved => &mut self.approved_at,
            Stage::Doing => &mut self.doing_at,
            Stage::Done => &mut self.done_at,
        };
        *slot = Some(at);
    }

    /// 已到达的最靠后的阶段
    pub fn status(&self) -> TicketStatus {
        Stage::ORDER
            .iter()
            .rev()
            .find(|stage| self.get(**stage).is_some())
            .map(|stage| TicketStatus::from(*stage))
            .unwrap_or(TicketStatus::AwaitingApproval)
    }

    /// 设置目标阶段为 now，并把之前尚未设置的阶段补齐为 now。
    /// 目标阶段已设置时不做任何修改并返回 None。
    pub fn advance(&mut self, target: Stage, now: DateTime<Utc>) -> Option<Stage> {
        if self.get(target).is_some() {
            return None;
        }
        for stage in target.predecessors() {
            if self.get(*stage).is_none() {
                self.set(*stage, now);
            }
        }
        self.set(target, now);
        Some(target)
    }
}

impl From<&ticket_entity::Model> for StageTimeline {
    fn from(ticket: &ticket_entity::Model) -> Self {
        Self {
            approved_at: ticket.approved_at,
            doing_at: ticket.doing_at,
            done_at: ticket.done_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTicketRequest {
    pub ticket_type: TicketType,
    #[schema(example = "Export button does nothing")]
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<i32>,
}

impl CreateTicketRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_title(&self.title)?;
        validate_content(&self.content)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateTicketRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub label_ids: Option<Vec<i32>>,
}

impl UpdateTicketRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> AppResult<()> {
    let len = title.trim().chars().count();
    if len == 0 || len > TITLE_MAX_LEN {
        return Err(AppError::ValidationError(format!(
            "Title must be between 1 and {TITLE_MAX_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Content must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketOrder {
    #[default]
    Recent,
    Oldest,
    Votes,
    Views,
    Comments,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TicketQuery {
    pub ticket_type: Option<TicketType>,
    pub status: Option<TicketStatus>,
    pub order_by: Option<TicketOrder>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketResponse {
    pub id: i32,
    pub user_id: i32,
    pub ticket_type: TicketType,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub doing_at: Option<DateTime<Utc>>,
    pub done_at: Option<DateTime<Utc>>,
    pub vote_total: i64,
    pub view_total: i64,
    pub comment_total: i64,
    pub labels: Vec<LabelResponse>,
}

/// 工单各项计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketTotals {
    pub votes: i64,
    pub views: i64,
    pub comments: i64,
}

impl TicketResponse {
    pub fn build(
        ticket: ticket_entity::Model,
        totals: TicketTotals,
        labels: Vec<LabelResponse>,
    ) -> Self {
        let status = StageTimeline::from(&ticket).status();
        Self {
            id: ticket.id,
            user_id: ticket.user_id,
            ticket_type: ticket.ticket_type,
            title: ticket.title,
            content: ticket.content,
            image_url: ticket.image_url,
            status,
            created_at: ticket.created_at,
            edited_at: ticket.edited_at,
            approved_at: ticket.approved_at,
            doing_at: ticket.doing_at,
            done_at: ticket.done_at,
            vote_total: totals.votes,
            view_total: totals.views,
            comment_total: totals.comments,
            labels,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketDetailResponse {
    #[serde(flatten)]
    pub ticket: TicketResponse,
    pub comments: Vec<CommentThread>,
    pub has_voted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// 仅对 Feature 有效，默认 1
    pub credits: Option<i64>,
}

/// 投票结果；失败时 message 给出原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteOutcome {
    pub success: bool,
    pub message: String,
}

impl VoteOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusChangeResponse {
    pub ticket_id: i32,
    pub stage: Stage,
    pub status: TicketStatus,
}
