use anyhow::Context;
use chrono::{TimeZone, Utc};
use colored::Colorize;
use follow_sdk::{
    CommitReceipt, FeedPost, Follow, FollowConfig, IdentityId, IdentityRecord, ItemStatus,
    PassReport, PostFile,
};
use follow_types::ContentId;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let follow = Follow::connect(config)
        .await
        .context("failed to open the local identity")?;
    let out = Output { format: cli.format };

    match cli.command {
        Command::Init => cmd_init(&follow, out).await,
        Command::Whoami => {
            out.emit(&json!({ "id": follow.get_id() }), || println!("{}", follow.get_id().as_str().cyan()));
            Ok(())
        }
        Command::Show(args) => cmd_show(&follow, args, out).await,
        Command::Following => cmd_following(&follow, out).await,
        Command::Follow(args) => {
            let receipt = follow.follow(&IdentityId::new(args.id.clone())).await?;
            report_commit(out, receipt, &format!("Following {}", args.id.yellow()), "already followed");
            Ok(())
        }
        Command::Unfollow(args) => {
            let receipt = follow.unfollow(&IdentityId::new(args.id.clone())).await?;
            report_commit(out, receipt, &format!("Unfollowed {}", args.id.yellow()), "not followed");
            Ok(())
        }
        Command::Post(args) => cmd_post(&follow, args, out).await,
        Command::Rm(args) => {
            let receipt = follow.remove_post(&ContentId::new(args.cid.clone())).await?;
            report_commit(out, receipt, &format!("Removed post {}", args.cid.yellow()), "no such post");
            Ok(())
        }
        Command::Repost(args) => {
            let receipt = follow.repost(&ContentId::new(args.cid.clone())).await?;
            report_commit(out, receipt, &format!("Reposted {}", args.cid.yellow()), "already in your posts");
            Ok(())
        }
        Command::Posts(args) => cmd_posts(&follow, args, out).await,
        Command::Feed(args) => cmd_feed(&follow, args, out).await,
        Command::Sync => cmd_sync(&follow, out).await,
        Command::Publish => {
            let receipt = follow.publish_identity().await?;
            out.emit(&receipt, || print_receipt("Published", &receipt));
            Ok(())
        }
        Command::Edit(args) => cmd_edit(&follow, args, out).await,
        Command::Daemon => cmd_daemon(&follow).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<FollowConfig> {
    let mut config = match &cli.config {
        Some(path) => FollowConfig::load(path)?,
        None => FollowConfig::default(),
    }
    .with_env_overrides();
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir = dir.clone();
    }
    Ok(config)
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) {
        match self.format {
            OutputFormat::Json => match serde_json::to_string_pretty(value) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("{} {e}", "error:".red().bold()),
            },
            OutputFormat::Text => text(),
        }
    }
}

fn report_commit(out: Output, receipt: Option<CommitReceipt>, done: &str, unchanged: &str) {
    let value = json!({ "changed": receipt.is_some(), "receipt": receipt });
    out.emit(&value, || match &receipt {
        Some(r) => print_receipt(done, r),
        None => println!("{} Nothing to do: {}", "-".dimmed(), unchanged),
    });
}

fn print_receipt(what: &str, receipt: &CommitReceipt) {
    println!("{} {}", "✓".green().bold(), what);
    println!("  Identity: {}", receipt.identity_cid.as_str().cyan());
    println!("  Published as: {}", receipt.name.as_str().dimmed());
}

fn format_ts(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn display_name(record: &IdentityRecord) -> String {
    if record.display_name.is_empty() {
        "(no name)".dimmed().to_string()
    } else {
        record.display_name.bold().to_string()
    }
}

fn print_identity(record: &IdentityRecord) {
    println!("{}  {}", display_name(record), record.id.as_str().cyan());
    if !record.avatar.is_empty() {
        println!("  Avatar: {}", record.avatar);
    }
    println!("  Following: {}", record.following.len());
    println!("  Posts: {}", record.posts.len());
    println!("  Updated: {}", format_ts(record.ts).dimmed());
}

fn print_post(post: &FeedPost) {
    let author = if post.identity.display_name.is_empty() {
        post.identity.id.short().to_string()
    } else {
        post.identity.display_name.clone()
    };
    println!(
        "{}  {}  {}",
        author.bold(),
        format_ts(post.ts()).dimmed(),
        post.post_cid.short().yellow()
    );
    for line in post.post.body.lines() {
        println!("  {line}");
    }
    if !post.post.files.is_empty() {
        println!("  {} {}", "files:".dimmed(), post.post.files.join(", "));
    }
    println!();
}

fn print_report(report: &PassReport) {
    for outcome in &report.identities {
        if let ItemStatus::Skipped { reason } = &outcome.status {
            println!("  {} {} {}", "skipped".red(), outcome.id.short(), reason.dimmed());
        } else if outcome.status == ItemStatus::Placeholder {
            println!("  {} {}", "unreachable".yellow(), outcome.id.short());
        }
    }
    for outcome in report.posts.iter().filter(|o| o.status.is_skipped()) {
        if let ItemStatus::Skipped { reason } = &outcome.status {
            println!("  {} {} {}", "skipped post".red(), outcome.cid.short(), reason.dimmed());
        }
    }
}

async fn cmd_init(follow: &Follow, out: Output) -> anyhow::Result<()> {
    let me = follow.get_self().await;
    let storage = follow.config().storage_dir.display().to_string();
    out.emit(&json!({ "id": me.id, "storage_dir": storage }), || {
        println!("{} Identity ready", "✓".green().bold());
        println!("  Id: {}", me.id.as_str().cyan());
        println!("  Storage: {}", storage);
    });
    Ok(())
}

fn target_id(follow: &Follow, id: Option<String>) -> IdentityId {
    id.map(IdentityId::new).unwrap_or_else(|| follow.get_id().clone())
}

async fn cmd_show(follow: &Follow, args: ShowArgs, out: Output) -> anyhow::Result<()> {
    let record = follow.get_identity(&target_id(follow, args.id)).await?;
    out.emit(&record, || print_identity(&record));
    Ok(())
}

async fn cmd_following(follow: &Follow, out: Output) -> anyhow::Result<()> {
    let following = follow.get_following().await;
    out.emit(&following, || {
        for record in &following {
            println!("{}  {}", record.id.as_str().cyan(), display_name(record));
        }
    });
    Ok(())
}

async fn cmd_post(follow: &Follow, args: PostArgs, out: Output) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(args.file.len());
    for path in &args.file {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("not a file path: {}", path.display()))?;
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        files.push(PostFile::new(name, content));
    }
    let cid = follow.add_post(args.body, files).await?;
    out.emit(&json!({ "cid": cid }), || {
        println!("{} Posted {}", "✓".green().bold(), cid.as_str().yellow());
    });
    Ok(())
}

async fn cmd_posts(follow: &Follow, args: ShowArgs, out: Output) -> anyhow::Result<()> {
    let posts = follow.get_posts(&target_id(follow, args.id)).await?;
    out.emit(&posts, || {
        if posts.is_empty() {
            println!("No posts.");
        }
        posts.iter().for_each(print_post);
    });
    Ok(())
}

async fn cmd_feed(follow: &Follow, args: FeedArgs, out: Output) -> anyhow::Result<()> {
    let mut feed = if args.refresh {
        follow.update_feed().await?.feed
    } else {
        follow.get_feed()?
    };
    if let Some(limit) = args.limit {
        feed.truncate(limit);
    }
    out.emit(&feed, || {
        if feed.is_empty() {
            println!("Feed is empty. Run {} to fetch posts.", "follow sync".bold());
        }
        feed.iter().for_each(print_post);
    });
    Ok(())
}

async fn cmd_sync(follow: &Follow, out: Output) -> anyhow::Result<()> {
    let following = follow.update_following().await;
    let refresh = follow.update_feed().await?;
    let value: Value = json!({
        "following": following,
        "feed": { "entries": refresh.feed.len(), "report": refresh.report },
    });
    out.emit(&value, || {
        println!(
            "{} Refreshed {} identities, feed has {} posts ({} new)",
            "✓".green().bold(),
            following.identities.len() - following.skipped_identities(),
            refresh.feed.len(),
            refresh.report.fetched_posts()
        );
        print_report(&following);
        print_report(&refresh.report);
    });
    Ok(())
}

async fn cmd_edit(follow: &Follow, args: EditArgs, out: Output) -> anyhow::Result<()> {
    let value = serde_json::from_str::<Value>(&args.value).unwrap_or(Value::String(args.value.clone()));
    let receipt = follow.edit_field(&args.key, &value).await?;
    report_commit(
        out,
        receipt,
        &format!("Set {}", args.key.bold()),
        "field not editable or value has the wrong type",
    );
    Ok(())
}

async fn cmd_daemon(follow: &Follow) -> anyhow::Result<()> {
    let config = follow.config();
    let mut refresh = tokio::time::interval(config.refresh_interval());
    let mut republish = tokio::time::interval(config.republish_interval());
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    republish.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(
        id = %follow.get_id(),
        refresh_secs = config.refresh_interval_secs,
        republish_secs = config.republish_interval_secs,
        "daemon started"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = refresh.tick() => {
                follow.update_following().await;
                if let Err(e) = follow.update_feed().await {
                    warn!(error = %e, "feed refresh failed");
                }
            }
            _ = republish.tick() => {
                if let Err(e) = follow.publish_identity().await {
                    warn!(error = %e, "periodic publish failed");
                }
            }
            _ = &mut shutdown => {
                info!("daemon stopping");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn timestamps_render_as_utc_minutes() {
        assert_eq!(format_ts(0), "1970-01-01 00:00");
        assert_eq!(format_ts(1_600_000_000_000), "2020-09-13 12:26");
        assert_eq!(format_ts(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "follow",
            "whoami",
            "--api-url",
            "http://node:5001",
            "--storage-dir",
            "/tmp/follow-store",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.api_url, "http://node:5001");
        assert_eq!(config.storage_dir, std::path::PathBuf::from("/tmp/follow-store"));
    }
}
