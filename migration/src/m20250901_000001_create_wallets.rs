use sea_orm_migration::prelude::*;

/// Wallets (用户积分钱包)
#[derive(DeriveIden)]
enum Wallets {
    Table,
    Id,
    UserId,
    Balance,
    CreatedAt,
}

/// Credit transactions (入账流水)
#[derive(DeriveIden)]
enum CreditTransactions {
    Table,
    Id,
    WalletId,
    Amount,
    RealValue,
    ExternalChargeId,
    Refunded,
    CreatedAt,
}

/// Debit transactions (扣减流水)
#[derive(DeriveIden)]
pub(crate) enum DebitTransactions {
    Table,
    Id,
    WalletId,
    Amount,
    RealValue,
    CreatedAt,
}

/// Payment intents (积分购买意图)
#[derive(DeriveIden)]
enum PaymentIntents {
    Table,
    Id,
    UserId,
    ExternalIntentId,
    RequestedCredits,
    AmountDue,
    Complete,
    OpenUserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Wallets::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 一个用户最多一个钱包
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_wallets_user_unique")
                    .table(Wallets::Table)
                    .col(Wallets::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CreditTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditTransactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CreditTransactions::WalletId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditTransactions::RealValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CreditTransactions::ExternalChargeId)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CreditTransactions::Refunded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CreditTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_credit_transactions_wallet")
                            .from(CreditTransactions::Table, CreditTransactions::WalletId)
                            .to(Wallets::Table, Wallets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_credit_transactions_wallet_created")
                    .table(CreditTransactions::Table)
                    .col(CreditTransactions::WalletId)
                    .col(CreditTransactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DebitTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DebitTransactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DebitTransactions::WalletId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DebitTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DebitTransactions::RealValue)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DebitTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_debit_transactions_wallet")
                            .from(DebitTransactions::Table, DebitTransactions::WalletId)
                            .to(Wallets::Table, Wallets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentIntents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentIntents::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentIntents::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(PaymentIntents::ExternalIntentId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentIntents::RequestedCredits)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentIntents::AmountDue)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentIntents::Complete)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PaymentIntents::OpenUserId).integer().null())
                    .col(
                        ColumnDef::new(PaymentIntents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentIntents::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payment_intents_external_unique")
                    .table(PaymentIntents::Table)
                    .col(PaymentIntents::ExternalIntentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 每个用户同时只能有一个未完成的购买意图；完成后 open_user_id 置空
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payment_intents_open_user_unique")
                    .table(PaymentIntents::Table)
                    .col(PaymentIntents::OpenUserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentIntents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DebitTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CreditTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        Ok(())
    }
}
