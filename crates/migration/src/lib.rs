pub use sea_orm_migration::prelude::*;

mod m20260106_090000_ledger;
mod m20260106_100000_offsets;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260106_090000_ledger::Migration),
            Box::new(m20260106_100000_offsets::Migration),
        ]
    }
}
