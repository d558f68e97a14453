pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_account_table;
mod m20240301_000002_create_tracked_transaction_table;
mod m20240301_000003_create_transaction_procedures;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_account_table::Migration),
            Box::new(m20240301_000002_create_tracked_transaction_table::Migration),
            Box::new(m20240301_000003_create_transaction_procedures::Migration),
        ]
    }
}
