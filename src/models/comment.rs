use crate::entities::comment_entity;
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    /// 回复的顶层评论 ID
    pub reply_to: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub content: String,
}

pub fn validate_comment_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Comment must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub ticket_id: i32,
    pub user_id: i32,
    pub reply_to: Option<i32>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl From<comment_entity::Model> for CommentResponse {
    fn from(m: comment_entity::Model) -> Self {
        Self {
            id: m.id,
            ticket_id: m.ticket_id,
            user_id: m.user_id,
            reply_to: m.reply_to,
            content: m.content,
            created_at: m.created_at,
            edited_at: m.edited_at,
        }
    }
}

/// 顶层评论及其回复（两级）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub replies: Vec<CommentResponse>,
}

impl CommentThread {
    /// 按创建顺序把评论组织成两级结构；找不到父评论的回复被丢弃
    pub fn build(comments: Vec<comment_entity::Model>) -> Vec<CommentThread> {
        let (top, replies): (Vec<_>, Vec<_>) =
            comments.into_iter().partition(|c| c.reply_to.is_none());

        let mut threads: Vec<CommentThread> = top
            .into_iter()
            .map(|c| CommentThread {
                comment: c.into(),
                replies: Vec::new(),
            })
            .collect();

        for reply in replies {
            if let Some(thread) = threads
                .iter_mut()
                .find(|t| Some(t.comment.id) == reply.reply_to)
            {
                thread.replies.push(reply.into());
            }
        }
        threads
    }
}
