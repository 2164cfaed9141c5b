use clap::Subcommand;

use chatdesk_config::ChatdeskConfig;

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
}

pub async fn handle_db(action: DbAction, config: &ChatdeskConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => migrate(config).await,
    }
}

async fn migrate(config: &ChatdeskConfig) -> anyhow::Result<()> {
    let pool = chatdesk_inbox::open_pool(&config.database).await?;
    chatdesk_inbox::run_migrations(&pool).await?;
    pool.close().await;
    println!("Migrations applied to {}", config.database.url);
    Ok(())
}
