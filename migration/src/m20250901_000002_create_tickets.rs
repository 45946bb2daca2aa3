use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_wallets::DebitTransactions;

#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    UserId,
    TicketType,
    Title,
    Content,
    ImageUrl,
    CreatedAt,
    EditedAt,
    ApprovedAt,
    DoingAt,
    DoneAt,
}

#[derive(DeriveIden)]
enum Labels {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum TicketLabels {
    Table,
    TicketId,
    LabelId,
}

#[derive(DeriveIden)]
enum Votes {
    Table,
    Id,
    TicketId,
    UserId,
    Count,
    DebitId,
    SingleVoterId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    TicketId,
    UserId,
    ReplyTo,
    Content,
    CreatedAt,
    EditedAt,
}

#[derive(DeriveIden)]
enum Pageviews {
    Table,
    Id,
    TicketId,
    SessionKey,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 工单：状态由 approved_at / doing_at / done_at 三个时间戳推导
        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tickets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tickets::UserId).integer().not_null())
                    .col(ColumnDef::new(Tickets::TicketType).string_len(16).not_null())
                    .col(ColumnDef::new(Tickets::Title).string_len(100).not_null())
                    .col(ColumnDef::new(Tickets::Content).text().not_null())
                    .col(ColumnDef::new(Tickets::ImageUrl).string_len(512).null())
                    .col(
                        ColumnDef::new(Tickets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::EditedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::ApprovedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::DoingAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::DoneAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_created_at")
                    .table(Tickets::Table)
                    .col(Tickets::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Labels::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Labels::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Labels::Name)
                            .string_len(30)
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TicketLabels::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TicketLabels::TicketId).integer().not_null())
                    .col(ColumnDef::new(TicketLabels::LabelId).integer().not_null())
                    .primary_key(
                        Index::create()
                            .col(TicketLabels::TicketId)
                            .col(TicketLabels::LabelId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_labels_ticket")
                            .from(TicketLabels::Table, TicketLabels::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_labels_label")
                            .from(TicketLabels::Table, TicketLabels::LabelId)
                            .to(Labels::Table, Labels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Votes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Votes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Votes::TicketId).integer().not_null())
                    .col(ColumnDef::new(Votes::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(Votes::Count)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Votes::DebitId).integer().null())
                    .col(ColumnDef::new(Votes::SingleVoterId).integer().null())
                    .col(
                        ColumnDef::new(Votes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_ticket")
                            .from(Votes::Table, Votes::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_debit")
                            .from(Votes::Table, Votes::DebitId)
                            .to(DebitTransactions::Table, DebitTransactions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Bug 投票：single_voter_id = user_id，同一用户对同一工单只能有一条；
        // Feature 投票该列为 NULL，不受限制
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_votes_single_voter_unique")
                    .table(Votes::Table)
                    .col(Votes::TicketId)
                    .col(Votes::SingleVoterId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Comments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Comments::TicketId).integer().not_null())
                    .col(ColumnDef::new(Comments::UserId).integer().not_null())
                    .col(ColumnDef::new(Comments::ReplyTo).integer().null())
                    .col(ColumnDef::new(Comments::Content).text().not_null())
                    .col(
                        ColumnDef::new(Comments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Comments::EditedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_ticket")
                            .from(Comments::Table, Comments::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_reply_to")
                            .from(Comments::Table, Comments::ReplyTo)
                            .to(Comments::Table, Comments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Pageviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Pageviews::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Pageviews::TicketId).integer().not_null())
                    .col(ColumnDef::new(Pageviews::SessionKey).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Pageviews::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pageviews_ticket")
                            .from(Pageviews::Table, Pageviews::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一会话对同一工单只计一次浏览
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pageviews_ticket_session_unique")
                    .table(Pageviews::Table)
                    .col(Pageviews::TicketId)
                    .col(Pageviews::SessionKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Pageviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Votes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TicketLabels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Labels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tickets::Table).to_owned())
            .await?;
        Ok(())
    }
}
