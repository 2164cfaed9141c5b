use std::sync::Arc;

use {anyhow::Context, clap::Subcommand};

use {
    chatdesk_config::ChatdeskConfig,
    chatdesk_inbox::{Inbox, InboxOptions, NoopSink},
    chatdesk_whatsapp_business::GraphClient,
};

#[derive(Subcommand)]
pub enum TemplatesAction {
    /// Fetch the template catalogue from WhatsApp and replace the local cache.
    Refresh,
    /// List the cached templates.
    List,
}

pub async fn handle_templates(
    action: TemplatesAction,
    config: &ChatdeskConfig,
) -> anyhow::Result<()> {
    let pool = chatdesk_inbox::open_pool(&config.database).await?;
    chatdesk_inbox::run_migrations(&pool).await?;
    let graph = Arc::new(GraphClient::new(&config.whatsapp)?);
    let inbox = Inbox::new(
        pool.clone(),
        graph,
        Arc::new(NoopSink),
        InboxOptions::from_config(config),
    );

    let outcome = match action {
        TemplatesAction::Refresh => inbox
            .refresh_templates()
            .await
            .context("template refresh failed")
            .map(|count| println!("Cached {count} template(s).")),
        TemplatesAction::List => match inbox.templates().await {
            Ok(list) => {
                if list.is_empty() {
                    println!("No cached templates. Run `chatdesk templates refresh`.");
                }
                for t in &list {
                    println!(
                        "  {:<32} {:<8} {:<10} {}",
                        t.name,
                        t.language,
                        t.status,
                        t.category.as_deref().unwrap_or("-")
                    );
                }
                Ok(())
            },
            Err(e) => Err(e.into()),
        },
    };
    pool.close().await;
    outcome
}
