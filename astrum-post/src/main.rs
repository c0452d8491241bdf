//! astrum-post - Create, enhance, schedule and publish content

use std::io::Read;
use std::path::PathBuf;

use chrono::{Local, Utc, Weekday};
use clap::{Parser, Subcommand};
use serde::Serialize;

use libastrum::enhancer::GrammarResult;
use libastrum::platforms::PlatformPayload;
use libastrum::types::{MediaItem, TaskStatus};
use libastrum::{
    AstrumError, AstrumService, Category, ContentItem, PlatformId, PublishReport,
    PublishStatus, Result,
};

#[derive(Parser, Debug)]
#[command(name = "astrum-post")]
#[command(version)]
#[command(about = "Create, enhance, schedule and publish content")]
#[command(long_about = "\
astrum-post - Create, enhance, schedule and publish content

DESCRIPTION:
    astrum-post manages the Astrumverse content library and publishes
    content items to Hashnode, Dev.to, Twitter, LinkedIn, Instagram and
    YouTube. Each platform is published independently: one failing
    platform does not stop the others.

USAGE EXAMPLES:
    # Create a draft from stdin
    cat post.md | astrum-post create --title \"Shipping 1.0\" --tag rust

    # Publish to two platforms
    astrum-post publish <ID> --platform devto,hashnode

    # Preview the request bodies without sending anything
    astrum-post publish <ID> --platform linkedin --dry-run

    # Retry only the platforms that failed last time
    astrum-post retry <ID>

    # Publish in two hours (picked up by astrum-send)
    astrum-post schedule <ID> 2h

    # Suggest tags with the AI provider that still has quota
    astrum-post enhance tags <ID> --platform devto --apply

CONFIGURATION:
    Configuration file: ~/.config/astrumverse/config.toml

    Override with environment variables:
        ASTRUM_CONFIG    - Path to config file
        ASTRUM_DB_PATH   - Path to database file
        ASTRUM_DATA_DIR  - Directory of stored documents

EXIT CODES:
    0 - Success (publishing: at least one platform succeeded)
    1 - Operation failed (publishing: every platform failed)
    2 - Configuration or credential error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a draft content item (body from --body or stdin)
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        body: Option<String>,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// blog, feed or reel
        #[arg(short, long, default_value = "blog")]
        category: String,

        /// Media URL (repeatable)
        #[arg(long = "media")]
        media: Vec<String>,

        #[arg(long)]
        cover: Option<String>,

        #[arg(long)]
        excerpt: Option<String>,

        #[arg(long)]
        author: Option<String>,
    },

    /// List content items, newest first
    List {
        /// Filter by status (draft, scheduled, published, failed)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show a content item and its publish records
    Show { id: String },

    /// Publish a content item now
    Publish {
        id: String,

        /// Target platforms, comma-separated (default: enabled platforms)
        #[arg(short, long)]
        platform: Option<String>,

        /// Print the request bodies instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-publish to the platforms whose last attempt failed
    Retry { id: String },

    /// Queue a content item for publication after a delay (e.g. 30m, 2h)
    Schedule {
        id: String,

        delay: String,

        #[arg(short, long)]
        platform: Option<String>,
    },

    /// AI-assisted grammar, tagging and platform optimization
    Enhance {
        #[command(subcommand)]
        action: EnhanceAction,
    },

    /// Dropbox-backed media buffer
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },

    /// Show platform readiness and toggles
    Platforms,

    /// Change a platform's toggles
    Toggle {
        platform: String,

        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,

        /// on or off
        #[arg(long, value_parser = ["on", "off"])]
        auto_publish: Option<String>,
    },

    /// Weekly publishing slots
    Slot {
        #[command(subcommand)]
        action: SlotAction,
    },

    /// Inspect or re-trigger queued tasks
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Show stored analytics (or collect now)
    Analytics {
        #[arg(short, long)]
        platform: Option<String>,

        #[arg(long)]
        collect: bool,
    },
}

#[derive(Subcommand, Debug)]
enum EnhanceAction {
    /// Correct grammar and spelling of the body
    Grammar {
        id: String,
        /// Replace the body with the corrected text
        #[arg(long)]
        apply: bool,
    },
    /// Suggest tags
    Tags {
        id: String,
        #[arg(short, long)]
        platform: Option<String>,
        /// Replace the item's tags with the suggestions
        #[arg(long)]
        apply: bool,
    },
    /// Rewrite the body for one platform
    Optimize {
        id: String,
        #[arg(short, long)]
        platform: String,
    },
}

#[derive(Subcommand, Debug)]
enum MediaAction {
    /// Upload a local file
    Upload {
        file: PathBuf,
        #[arg(short, long)]
        platform: String,
    },
    /// List buffered media
    List {
        #[arg(short, long)]
        platform: Option<String>,
        /// Only media not yet attached to content
        #[arg(long)]
        unused: bool,
    },
    /// Attach a media item to a content item
    Attach { media_id: String, content_id: String },
    /// Forget a media item (and optionally delete the remote file)
    Remove {
        id: String,
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SlotAction {
    /// Add a slot, e.g. `slot add fri 09:30 blog --platform devto`
    Add {
        day: String,
        time: String,
        category: String,
        /// Comma-separated targets (default: auto-publish platforms)
        #[arg(short, long)]
        platform: Option<String>,
    },
    List,
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    List {
        /// pending, completed or failed
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Make a task pending again, due now
    Requeue { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libastrum::logging::init_for_cli(cli.verbose);

    match run(cli).await {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let service = AstrumService::new().await?;
    let json = cli.format == "json";

    match cli.command {
        Commands::Create {
            title,
            body,
            tags,
            category,
            media,
            cover,
            excerpt,
            author,
        } => {
            let body = match body {
                Some(body) => body,
                None => read_stdin()?,
            };
            let mut item = ContentItem::new(title, body)
                .with_tags(tags)
                .with_media(media)
                .with_category(category.parse().map_err(AstrumError::InvalidInput)?);
            item.cover_image = cover;
            if let Some(excerpt) = excerpt {
                item.excerpt = excerpt;
            }
            item.author = author.unwrap_or_default();

            let item = service.content().create(item)?;
            if json {
                print_json(&item);
            } else {
                println!("{}", item.id);
            }
        }

        Commands::List { status } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let items = service.content().list(status)?;
            if json {
                print_json(&items);
            } else {
                for item in items {
                    println!(
                        "{} | {} | {} | {}",
                        item.id,
                        item.publish_status,
                        item.category,
                        truncate(&item.title, 50)
                    );
                }
            }
        }

        Commands::Show { id } => {
            let item = service.content().get(&id)?;
            let records = service.publisher().records(&id).await?;
            if json {
                print_json(&serde_json::json!({ "content": item, "records": records }));
            } else {
                println!("{} [{}] {}", item.id, item.publish_status, item.title);
                if let Some(when) = item.scheduled_for {
                    println!("scheduled for {}", when.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
                }
                for record in records {
                    println!(
                        "  {}: {} (retries: {}) {}",
                        record.platform,
                        record.status.as_str(),
                        record.retry_count,
                        record
                            .url
                            .or(record.error_message)
                            .unwrap_or_default()
                    );
                }
            }
        }

        Commands::Publish {
            id,
            platform,
            dry_run,
        } => {
            let targets = parse_platforms(platform.as_deref())?;
            if dry_run {
                return dry_run_payloads(&service, &id, targets, json);
            }
            let report = service.publish_content(&id, &targets).await?;
            return Ok(print_report(&report, json));
        }

        Commands::Retry { id } => {
            let report = service.retry_failed(&id).await?;
            if report.is_empty() {
                if !json {
                    println!("Nothing to retry");
                } else {
                    print_json(&report);
                }
                return Ok(0);
            }
            return Ok(print_report(&report, json));
        }

        Commands::Schedule {
            id,
            delay,
            platform,
        } => {
            let delay = humantime::parse_duration(&delay).map_err(|e| {
                AstrumError::InvalidInput(format!("Invalid delay '{}': {}", delay, e))
            })?;
            let delay = chrono::Duration::from_std(delay)
                .map_err(|_| AstrumError::InvalidInput("Delay is too large".to_string()))?;
            let when = Utc::now() + delay;

            let targets = parse_platforms(platform.as_deref())?;
            let task = service.schedule_publish(&id, targets, when).await?;
            if json {
                print_json(&task);
            } else {
                println!(
                    "{} scheduled for {} (task {})",
                    id,
                    when.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    task.id
                );
            }
        }

        Commands::Enhance { action } => return enhance(&service, action, json).await,

        Commands::Media { action } => return media(&service, action, json).await,

        Commands::Platforms => {
            let credentials = service.credentials()?;
            let toggles = service.toggles().list(&credentials)?;
            if json {
                let rows: Vec<_> = toggles
                    .iter()
                    .map(|(platform, toggle)| {
                        serde_json::json!({
                            "platform": platform,
                            "enabled": toggle.enabled,
                            "autoPublish": toggle.auto_publish,
                            "hasApiKeys": toggle.has_api_keys,
                        })
                    })
                    .collect();
                print_json(&rows);
            } else {
                for (platform, toggle) in toggles {
                    println!(
                        "{:<10} {:<8} {:<12} {}",
                        platform.as_str(),
                        if toggle.enabled { "enabled" } else { "disabled" },
                        if toggle.auto_publish { "auto" } else { "manual" },
                        if toggle.has_api_keys { "ready" } else { "missing keys" }
                    );
                }
            }
        }

        Commands::Toggle {
            platform,
            enable,
            disable,
            auto_publish,
        } => {
            let platform: PlatformId = platform.parse().map_err(as_invalid_input)?;
            let credentials = service.credentials()?;
            let mut toggle = service.toggles().get(&credentials, platform)?;
            if enable || disable {
                toggle = service.toggles().set_enabled(&credentials, platform, enable)?;
            }
            if let Some(auto) = auto_publish {
                toggle = service
                    .toggles()
                    .set_auto_publish(&credentials, platform, auto == "on")?;
            }
            if json {
                print_json(&toggle);
            } else {
                println!(
                    "{}: enabled={} autoPublish={} hasApiKeys={}",
                    platform, toggle.enabled, toggle.auto_publish, toggle.has_api_keys
                );
            }
        }

        Commands::Slot { action } => match action {
            SlotAction::Add {
                day,
                time,
                category,
                platform,
            } => {
                let day: Weekday = day.parse().map_err(|_| {
                    AstrumError::InvalidInput(format!("Invalid day '{}'", day))
                })?;
                let category: Category = category.parse().map_err(AstrumError::InvalidInput)?;
                let platforms = parse_platforms(platform.as_deref())?;
                let slot = service.schedule().add(day, &time, category, platforms)?;
                if json {
                    print_json(&slot);
                } else {
                    println!("{}", slot.id);
                }
            }
            SlotAction::List => {
                let slots = service.schedule().list()?;
                if json {
                    print_json(&slots);
                } else {
                    for slot in slots {
                        let platforms: Vec<&str> =
                            slot.platforms.iter().map(PlatformId::as_str).collect();
                        println!(
                            "{} | {:?} {} | {} | {}",
                            slot.id,
                            slot.day,
                            slot.time,
                            slot.category,
                            platforms.join(",")
                        );
                    }
                }
            }
            SlotAction::Remove { id } => {
                if !service.schedule().remove(&id)? {
                    return Err(AstrumError::InvalidInput(format!("No slot with id {}", id)));
                }
            }
        },

        Commands::Queue { action } => match action {
            QueueAction::List { status } => {
                let status: Option<TaskStatus> = status
                    .as_deref()
                    .map(str::parse)
                    .transpose()
                    .map_err(AstrumError::InvalidInput)?;
                let tasks = service.tasks().list(status).await?;
                if json {
                    print_json(&tasks);
                } else {
                    for task in tasks {
                        println!(
                            "{} | {} | {} | {}",
                            task.id,
                            task.task_type,
                            task.status,
                            format_timestamp(task.scheduled_for)
                        );
                    }
                }
            }
            QueueAction::Requeue { id } => {
                if !service.tasks().requeue(&id).await? {
                    return Err(AstrumError::InvalidInput(format!("No task with id {}", id)));
                }
            }
        },

        Commands::Analytics { platform, collect } => {
            if collect {
                service.analytics().collect().await?;
            }
            let platform = platform
                .as_deref()
                .map(str::parse::<PlatformId>)
                .transpose()
                .map_err(as_invalid_input)?;
            let history = service.analytics().history(platform)?;
            if json {
                print_json(&history);
            } else {
                for s in history {
                    println!(
                        "{} {:<8} views={} likes={} comments={} followers={}",
                        s.date,
                        s.platform.as_str(),
                        s.views,
                        s.likes,
                        s.comments,
                        s.followers
                    );
                }
            }
        }
    }

    Ok(0)
}

async fn enhance(service: &AstrumService, action: EnhanceAction, json: bool) -> Result<i32> {
    match action {
        EnhanceAction::Grammar { id, apply } => {
            let item = service.content().get(&id)?;
            let result: GrammarResult = service.enhancer().check_grammar(&item.body).await;
            if result.success && apply {
                if result.corrected_text.trim().is_empty() {
                    return Err(AstrumError::InvalidInput(
                        "Refusing to apply an empty correction".to_string(),
                    ));
                }
                let corrected = result.corrected_text.clone();
                service.content().modify(&id, |item| item.body = corrected)?;
            }
            if json {
                print_json(&result);
            } else if let Some(error) = &result.error {
                eprintln!("Error: {}", error);
            } else {
                println!("{}", result.corrected_text);
                for suggestion in &result.suggestions {
                    eprintln!("- {}", suggestion);
                }
            }
            Ok(if result.success { 0 } else { 1 })
        }
        EnhanceAction::Tags {
            id,
            platform,
            apply,
        } => {
            let item = service.content().get(&id)?;
            let platform = platform
                .as_deref()
                .map(str::parse::<PlatformId>)
                .transpose()
                .map_err(as_invalid_input)?;
            let content = format!("{}\n\n{}", item.title, item.body);
            let result = service.enhancer().generate_tags(&content, platform).await;
            if result.success && apply {
                let tags = result.tags.clone();
                service.content().modify(&id, |item| item.tags = tags)?;
            }
            if json {
                print_json(&result);
            } else if let Some(error) = &result.error {
                eprintln!("Error: {}", error);
            } else {
                println!("{}", result.tags.join(", "));
            }
            Ok(if result.success { 0 } else { 1 })
        }
        EnhanceAction::Optimize { id, platform } => {
            let item = service.content().get(&id)?;
            let platform: PlatformId = platform.parse().map_err(as_invalid_input)?;
            let result = service
                .enhancer()
                .optimize_content(&item.body, platform)
                .await;
            if json {
                print_json(&result);
            } else if let Some(error) = &result.error {
                eprintln!("Error: {}", error);
            } else {
                println!("{}", result.optimized_text);
            }
            Ok(if result.success { 0 } else { 1 })
        }
    }
}

async fn media(service: &AstrumService, action: MediaAction, json: bool) -> Result<i32> {
    match action {
        MediaAction::Upload { file, platform } => {
            let platform: PlatformId = platform.parse().map_err(as_invalid_input)?;
            match service.media().upload_file(&file, platform.as_str()).await {
                Some(item) => {
                    if json {
                        print_json(&item);
                    } else {
                        println!("{} {}", item.id, item.url);
                    }
                    Ok(0)
                }
                None => {
                    eprintln!("Error: upload of {} failed (see log for details)", file.display());
                    Ok(1)
                }
            }
        }
        MediaAction::List { platform, unused } => {
            let items: Vec<MediaItem> = match (platform, unused) {
                (Some(platform), true) => service.media().unused(&platform)?,
                (platform, _) => service.media().list(platform.as_deref())?,
            };
            if json {
                print_json(&items);
            } else {
                for item in items {
                    println!(
                        "{} | {} | {:?} | {}",
                        item.id, item.platform, item.status, item.url
                    );
                }
            }
            Ok(0)
        }
        MediaAction::Attach {
            media_id,
            content_id,
        } => {
            let item = service
                .media()
                .mark_used(&media_id)?
                .ok_or_else(|| AstrumError::InvalidInput(format!("No media with id {}", media_id)))?;
            let url = item.url.clone();
            service.content().modify(&content_id, |content| {
                if !content.media_urls.contains(&url) {
                    content.media_urls.push(url);
                }
            })?;
            if !json {
                println!("Attached {} to {}", media_id, content_id);
            } else {
                print_json(&item);
            }
            Ok(0)
        }
        MediaAction::Remove { id, remote } => {
            if remote {
                let item = service
                    .media()
                    .list(None)?
                    .into_iter()
                    .find(|item| item.id == id);
                if let Some(item) = item {
                    if !service.media().delete_remote(&item).await {
                        eprintln!("Warning: remote file {} was not deleted", item.remote_path);
                    }
                }
            }
            if !service.media().remove(&id)? {
                return Err(AstrumError::InvalidInput(format!("No media with id {}", id)));
            }
            Ok(0)
        }
    }
}

fn dry_run_payloads(
    service: &AstrumService,
    id: &str,
    targets: Vec<PlatformId>,
    json: bool,
) -> Result<i32> {
    let item = service.content().get(id)?;
    let credentials = service.credentials()?;
    let targets = if targets.is_empty() {
        service.default_targets()?
    } else {
        targets
    };

    let mut payloads = serde_json::Map::new();
    for platform in targets {
        let value = match PlatformPayload::build(platform, &item, &credentials) {
            Ok(payload) => payload.to_json(),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };
        payloads.insert(platform.as_str().to_string(), value);
    }

    if json {
        print_json(&payloads);
    } else {
        for (platform, payload) in payloads {
            println!("== {}", platform);
            print_json(&payload);
        }
    }
    Ok(0)
}

/// Print a publish report; returns 1 when every platform failed
fn print_report(report: &PublishReport, json: bool) -> i32 {
    if json {
        print_json(report);
    } else {
        for (platform, outcome) in report {
            if outcome.success {
                println!(
                    "{}: ok {}",
                    platform,
                    outcome.url.as_deref().unwrap_or_default()
                );
            } else {
                println!(
                    "{}: failed - {}",
                    platform,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    match AstrumService::report_status(report) {
        PublishStatus::Published => 0,
        _ => 1,
    }
}

fn parse_platforms(list: Option<&str>) -> Result<Vec<PlatformId>> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<PlatformId>().map_err(as_invalid_input))
        .collect()
}

fn parse_status(s: &str) -> Result<PublishStatus> {
    match s.to_lowercase().as_str() {
        "draft" => Ok(PublishStatus::Draft),
        "scheduled" => Ok(PublishStatus::Scheduled),
        "published" => Ok(PublishStatus::Published),
        "failed" => Ok(PublishStatus::Failed),
        _ => Err(AstrumError::InvalidInput(format!(
            "Invalid status: '{}'. Valid options: draft, scheduled, published, failed",
            s
        ))),
    }
}

/// Unknown platform names are a usage error, not a platform failure
fn as_invalid_input(e: AstrumError) -> AstrumError {
    match e {
        AstrumError::Platform(inner) => AstrumError::InvalidInput(inner.to_string()),
        other => other,
    }
}

fn read_stdin() -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        return Err(AstrumError::InvalidInput(
            "No body given: pass --body or pipe content on stdin".to_string(),
        ));
    }
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| AstrumError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
    let body = buffer.trim().to_string();
    if body.is_empty() {
        return Err(AstrumError::InvalidInput("Content body cannot be empty".to_string()));
    }
    Ok(body)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to encode output: {}", e),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
