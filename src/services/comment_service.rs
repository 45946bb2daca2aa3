use crate::entities::comment_entity as comments;
use crate::error::{AppError, AppResult};
use crate::models::{CommentResponse, CommentThread, CreateCommentRequest, validate_comment_content};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

/// 工单的评论树，按发表顺序
pub async fn threads_for<C: ConnectionTrait>(
    db: &C,
    ticket_id: i32,
) -> Result<Vec<CommentThread>, DbErr> {
    let list = comments::Entity::find()
        .filter(comments::Column::TicketId.eq(ticket_id))
        .order_by_asc(comments::Column::CreatedAt)
        .order_by_asc(comments::Column::Id)
        .all(db)
        .await?;
    Ok(CommentThread::build(list))
}

#[derive(Clone)]
pub struct CommentService {
    pool: DatabaseConnection,
}

impl CommentService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 发表评论或回复。回复的父评论必须属于同一工单且本身不是回复
    pub async fn add(
        &self,
        ticket_id: i32,
        user_id: i32,
        req: CreateCommentRequest,
    ) -> AppResult<CommentResponse> {
        validate_comment_content(&req.content)?;

        if let Some(parent_id) = req.reply_to {
            let parent = comments::Entity::find_by_id(parent_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| AppError::ValidationError("Parent comment not found".to_string()))?;
            if parent.ticket_id != ticket_id {
                return Err(AppError::ValidationError(
                    "Parent comment belongs to another ticket".to_string(),
                ));
            }
            if parent.reply_to.is_some() {
                return Err(AppError::ValidationError(
                    "Replies cannot be replied to".to_string(),
                ));
            }
        }

        let comment = comments::ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(user_id),
            reply_to: Set(req.reply_to),
            content: Set(req.content),
            created_at: Set(Utc::now()),
            edited_at: Set(None),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(comment.into())
    }

    pub async fn get(&self, ticket_id: i32, comment_id: i32) -> AppResult<comments::Model> {
        comments::Entity::find_by_id(comment_id)
            .filter(comments::Column::TicketId.eq(ticket_id))
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
    }

    pub async fn edit(&self, comment: comments::Model, content: String) -> AppResult<CommentResponse> {
        validate_comment_content(&content)?;
        let mut active: comments::ActiveModel = comment.into();
        active.content = Set(content);
        active.edited_at = Set(Some(Utc::now()));
        Ok(active.update(&self.pool).await?.into())
    }

    pub async fn threads(&self, ticket_id: i32) -> AppResult<Vec<CommentThread>> {
        Ok(threads_for(&self.pool, ticket_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TicketType;
    use crate::test_utils::{insert_approved_ticket, setup_test_db};

    fn comment(content: &str, reply_to: Option<i32>) -> CreateCommentRequest {
        CreateCommentRequest {
            content: content.to_string(),
            reply_to,
        }
    }

    #[tokio::test]
    async fn test_comment_and_reply_threads() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = CommentService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Bug, "Broken").await?;

        let top = service.add(ticket.id, 2, comment("Same here", None)).await?;
        service.add(ticket.id, 1, comment("Thanks", Some(top.id))).await?;
        service.add(ticket.id, 3, comment("Another", None)).await?;

        let threads = service.threads(ticket.id).await?;
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, top.id);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].content, "Thanks");
        assert!(threads[1].replies.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reply_rules() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = CommentService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Bug, "Broken").await?;
        let other = insert_approved_ticket(&db, 1, TicketType::Bug, "Other").await?;

        let top = service.add(ticket.id, 2, comment("Top", None)).await?;
        let reply = service.add(ticket.id, 2, comment("Reply", Some(top.id))).await?;

        assert!(matches!(
            service.add(ticket.id, 2, comment("Nested", Some(reply.id))).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.add(other.id, 2, comment("Elsewhere", Some(top.id))).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.add(ticket.id, 2, comment("Ghost", Some(999))).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(service.add(ticket.id, 2, comment("  ", None)).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_sets_edited_at() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = CommentService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Bug, "Broken").await?;
        let created = service.add(ticket.id, 2, comment("Frist", None)).await?;
        assert!(created.edited_at.is_none());

        let model = service.get(ticket.id, created.id).await?;
        let edited = service.edit(model, "First".to_string()).await?;
        assert_eq!(edited.content, "First");
        assert!(edited.edited_at.is_some());

        assert!(matches!(
            service.get(ticket.id + 1, created.id).await,
            Err(AppError::NotFound(_))
        ));
        Ok(())
    }
}
