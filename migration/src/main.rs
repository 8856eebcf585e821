use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // 未设置 DATABASE_URL 时默认使用 data/eventhub.db
    if env::var("DATABASE_URL").is_err() {
        let db_path = if env::current_dir().is_ok_and(|dir| dir.ends_with("migration")) {
            "../data/eventhub.db"
        } else {
            "data/eventhub.db"
        };
        unsafe {
            env::set_var("DATABASE_URL", format!("sqlite://{db_path}?mode=rwc"));
        }
    }
    cli::run_cli(migration::Migrator).await;
}
