#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI that marks every unread Gmail inbox message as read

use anyhow::Context;
use clap::Parser;
use gmail_mark_read::auth::{Authorizer, ClientSecret, GMAIL_MODIFY_SCOPE, TokenStore};
use gmail_mark_read::{
    DispatchReport, GmailClient, GmailConfig, MessageId, ThrottledExecutor, mark_read_all,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gmail-mark-read")]
#[command(about = "Mark every unread message in a Gmail inbox as read")]
struct Args {
    /// Path to the OAuth client_secret.json
    #[arg(long)]
    client_secret: Option<PathBuf>,

    /// Directory where the OAuth token is cached
    #[arg(long)]
    token_dir: Option<PathBuf>,

    /// Gmail user id (`me` is the authorized account)
    #[arg(long)]
    user: Option<String>,

    /// Only list the unread messages, do not modify them
    #[arg(long)]
    dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = apply_overrides(GmailConfig::from_env()?, &args);

    let secret = ClientSecret::from_file(&config.client_secret)
        .await
        .with_context(|| {
            format!(
                "loading client secret from {}",
                config.client_secret.display()
            )
        })?;
    let authorizer = Authorizer::authorize(
        secret,
        &[GMAIL_MODIFY_SCOPE],
        &config.user,
        TokenStore::new(&config.token_dir),
        |url| {
            eprintln!("Open this URL in your browser to authorize access:\n\n  {url}\n");
        },
    )
    .await?;

    let executor = Arc::new(ThrottledExecutor::new(config.throttle)?);
    let client = Arc::new(GmailClient::new(&config, Arc::new(authorizer))?);

    let ids = client.list_unread_ids(&executor).await?;

    if args.dry_run {
        print_ids(&ids, args.json)?;
        return Ok(());
    }

    let json = args.json;
    let report = mark_read_all(client, executor, ids, move |id| {
        if !json {
            println!("Message {id} marked as read.");
        }
    })
    .await;

    print_summary(&report, args.json)?;
    report.into_result()?;
    Ok(())
}

fn apply_overrides(mut config: GmailConfig, args: &Args) -> GmailConfig {
    if let Some(path) = &args.client_secret {
        config.client_secret.clone_from(path);
    }
    if let Some(dir) = &args.token_dir {
        config.token_dir.clone_from(dir);
    }
    if let Some(user) = &args.user {
        config.user.clone_from(user);
    }
    config
}

fn print_ids(ids: &[MessageId], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(ids)?);
        return Ok(());
    }

    if ids.is_empty() {
        println!("No unread messages.");
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    println!("\n{} unread message(s)", ids.len());
    Ok(())
}

fn print_summary(report: &DispatchReport, json: bool) -> anyhow::Result<()> {
    if json {
        let failed: Vec<serde_json::Value> = report
            .failed
            .iter()
            .map(|(id, err)| serde_json::json!({ "id": id, "error": err.to_string() }))
            .collect();
        let summary = serde_json::json!({
            "marked": report.succeeded,
            "failed": failed,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "\n{} of {} message(s) marked as read",
        report.succeeded.len(),
        report.total()
    );
    for (id, err) in &report.failed {
        eprintln!("Failed to mark {id}: {err}");
    }
    Ok(())
}
