//! 投票：Bug 每人一票，Feature 可重复投票并按积分加权

use crate::database::is_unique_violation;
use crate::entities::{TicketType, ticket_entity as tickets, vote_entity as votes};
use crate::error::AppResult;
use crate::models::VoteOutcome;
use crate::services::wallet_service;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};

pub async fn has_voted<C: ConnectionTrait>(
    db: &C,
    ticket_id: i32,
    user_id: i32,
) -> Result<bool, DbErr> {
    let count = votes::Entity::find()
        .filter(votes::Column::TicketId.eq(ticket_id))
        .filter(votes::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// 工单的票数合计 (Σ count)
pub async fn vote_total<C: ConnectionTrait>(db: &C, ticket_id: i32) -> Result<i64, DbErr> {
    let total: Option<Option<i64>> = votes::Entity::find()
        .select_only()
        .column_as(Expr::col(votes::Column::Count).sum(), "total")
        .filter(votes::Column::TicketId.eq(ticket_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

#[derive(Clone)]
pub struct VoteService {
    pool: DatabaseConnection,
}

impl VoteService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 投票。credits 仅对 Feature 生效，默认 1
    pub async fn vote(
        &self,
        ticket: &tickets::Model,
        user_id: i32,
        credits: Option<i64>,
    ) -> AppResult<VoteOutcome> {
        match ticket.ticket_type {
            TicketType::Bug => self.vote_bug(ticket.id, user_id).await,
            TicketType::Feature => {
                self.vote_feature(ticket.id, user_id, credits.unwrap_or(1))
                    .await
            }
        }
    }

    async fn vote_bug(&self, ticket_id: i32, user_id: i32) -> AppResult<VoteOutcome> {
        if has_voted(&self.pool, ticket_id, user_id).await? {
            return Ok(VoteOutcome::failure("You have already voted for this bug."));
        }

        let inserted = votes::ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(user_id),
            count: Set(1),
            debit_id: Set(None),
            single_voter_id: Set(Some(user_id)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(VoteOutcome::success("Successfully voted for this bug.")),
            // 并发的重复投票由唯一索引拦截
            Err(e) if is_unique_violation(&e) => {
                Ok(VoteOutcome::failure("You have already voted for this bug."))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn vote_feature(
        &self,
        ticket_id: i32,
        user_id: i32,
        credits: i64,
    ) -> AppResult<VoteOutcome> {
        let Ok(count) = i32::try_from(credits) else {
            return Ok(VoteOutcome::failure("That is too many credits for one vote."));
        };
        if count < 1 {
            return Ok(VoteOutcome::failure("You must spend at least one credit."));
        }

        let txn = self.pool.begin().await?;
        let Some(debit) = wallet_service::debit_user(&txn, user_id, credits, 0).await? else {
            txn.rollback().await?;
            return Ok(VoteOutcome::failure(
                "You have insufficient credits for this vote.",
            ));
        };

        votes::ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(user_id),
            count: Set(count),
            debit_id: Set(Some(debit.id)),
            single_voter_id: Set(None),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        let unit = if credits == 1 { "credit" } else { "credits" };
        Ok(VoteOutcome::success(format!(
            "Successfully spent {credits} {unit} on this feature."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_approved_ticket, setup_test_db};

    #[tokio::test]
    async fn test_bug_vote_once_per_user() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = VoteService::new(db.clone());
        let bug = insert_approved_ticket(&db, 1, TicketType::Bug, "Crash").await?;

        let first = service.vote(&bug, 2, None).await?;
        assert!(first.success);
        assert!(first.message.to_lowercase().contains("success"));

        let second = service.vote(&bug, 2, None).await?;
        assert!(!second.success);
        assert!(second.message.contains("already voted"));

        assert_eq!(vote_total(&db, bug.id).await?, 1);
        assert!(has_voted(&db, bug.id, 2).await?);
        assert!(!has_voted(&db, bug.id, 3).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_bug_vote_ignores_credits() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = VoteService::new(db.clone());
        let bug = insert_approved_ticket(&db, 1, TicketType::Bug, "Crash").await?;

        assert!(service.vote(&bug, 2, Some(5)).await?.success);
        assert!(service.vote(&bug, 3, None).await?.success);
        assert_eq!(vote_total(&db, bug.id).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_bug_vote_rejected_by_index() -> AppResult<()> {
        let db = setup_test_db().await?;
        let bug = insert_approved_ticket(&db, 1, TicketType::Bug, "Crash").await?;
        let row = |user_id| votes::ActiveModel {
            ticket_id: Set(bug.id),
            user_id: Set(user_id),
            count: Set(1),
            single_voter_id: Set(Some(user_id)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        row(2).insert(&db).await?;
        let err = row(2).insert(&db).await.unwrap_err();
        assert!(is_unique_violation(&err));
        Ok(())
    }

    #[tokio::test]
    async fn test_feature_votes_are_weighted() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = VoteService::new(db.clone());
        let feature = insert_approved_ticket(&db, 1, TicketType::Feature, "Dark mode").await?;
        let wallet = wallet_service::ensure_wallet(&db, 2).await?;
        wallet_service::credit(&db, wallet.id, 10, 0, None).await?;

        let outcome = service.vote(&feature, 2, Some(5)).await?;
        assert!(outcome.success);
        assert!(outcome.message.contains("5 credits"));
        assert!(service.vote(&feature, 2, Some(3)).await?.success);

        assert_eq!(vote_total(&db, feature.id).await?, 8);
        assert_eq!(wallet_service::find_wallet(&db, 2).await?.unwrap().balance, 2);

        let rows = votes::Entity::find().all(&db).await?;
        assert!(rows.iter().all(|v| v.debit_id.is_some()));
        Ok(())
    }

    #[tokio::test]
    async fn test_feature_vote_with_insufficient_credits() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = VoteService::new(db.clone());
        let feature = insert_approved_ticket(&db, 1, TicketType::Feature, "Dark mode").await?;

        // 没有钱包
        let outcome = service.vote(&feature, 2, None).await?;
        assert!(!outcome.success);
        assert!(outcome.message.to_lowercase().contains("insufficient credits"));

        let wallet = wallet_service::ensure_wallet(&db, 2).await?;
        wallet_service::credit(&db, wallet.id, 2, 0, None).await?;
        assert!(!service.vote(&feature, 2, Some(3)).await?.success);

        assert_eq!(votes::Entity::find().count(&db).await?, 0);
        assert_eq!(wallet_service::find_wallet(&db, 2).await?.unwrap().balance, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_feature_vote_needs_positive_credits() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = VoteService::new(db.clone());
        let feature = insert_approved_ticket(&db, 1, TicketType::Feature, "Dark mode").await?;

        assert!(!service.vote(&feature, 2, Some(0)).await?.success);
        assert!(!service.vote(&feature, 2, Some(-4)).await?.success);
        Ok(())
    }
}
