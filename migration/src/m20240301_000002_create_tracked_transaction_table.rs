use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TrackedTransaction::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackedTransaction::PublicAddress)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TrackedTransaction::Txid).string_len(64).not_null())
                    .col(ColumnDef::new(TrackedTransaction::Vout).integer().not_null())
                    .col(
                        ColumnDef::new(TrackedTransaction::Amount)
                            .decimal_len(16, 8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackedTransaction::Confirmations)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(TrackedTransaction::State)
                            .string_len(16)
                            .not_null()
                            .default("unconfirmed"),
                    )
                    .col(
                        ColumnDef::new(TrackedTransaction::SpentTxid)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(TrackedTransaction::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(TrackedTransaction::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(TrackedTransaction::PublicAddress)
                            .col(TrackedTransaction::Txid)
                            .col(TrackedTransaction::Vout),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                "ALTER TABLE tracked_transaction ADD CONSTRAINT tracked_transaction_state_check \
                 CHECK (state IN ('unconfirmed', 'confirmed', 'credited', 'spent', 'error'));",
            )
            .await?;

        // The poll loop and the cashout job both select by state
        manager
            .create_index(
                Index::create()
                    .name("idx_tracked_transaction_state")
                    .table(TrackedTransaction::Table)
                    .col(TrackedTransaction::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tracked_transaction_txid")
                    .table(TrackedTransaction::Table)
                    .col(TrackedTransaction::Txid)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackedTransaction::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TrackedTransaction {
    Table,
    PublicAddress,
    Txid,
    Vout,
    Amount,
    Confirmations,
    State,
    SpentTxid,
    CreatedAt,
    UpdatedAt,
}
