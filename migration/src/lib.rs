pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users_table;
mod m20250415_000001_add_photos_tokens_to_users;
mod m20250501_000001_create_sessions_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users_table::Migration),
            Box::new(m20250415_000001_add_photos_tokens_to_users::Migration),
            Box::new(m20250501_000001_create_sessions_table::Migration),
        ]
    }
}
