//! VisionFlow - object detection client
//!
//! CLI entry point: each invocation restores the persisted state, runs one
//! command against the detection service, and persists the result.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tokio_util::sync::CancellationToken;
use tracing::info;

use visionflow::app::App;
use visionflow::cli::{Cli, Command, OutputFormat, SettingsCommand};
use visionflow::config::Config;
use visionflow::domain::{Notification, Severity, SettingsPatch, UploadItem};
use visionflow::notify::follow_notifications;
use visionflow::state::AppState;
use visionflow::upload::MediaFile;

/// Number of results shown under "Recent activity"
const RECENT_ACTIVITY_LIMIT: usize = 5;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("visionflow")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = match level.map(|l| l.to_lowercase()).as_deref() {
        Some("trace") => tracing::Level::TRACE,
        Some("debug") => tracing::Level::DEBUG,
        Some("warn") => tracing::Level::WARN,
        Some("error") => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let log_file = fs::File::create(log_dir.join("visionflow.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI flag beats config file beats default
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()));
    setup_logging(log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("VisionFlow loaded config: backend={}", config.api.base_url);

    let app = App::start(&config).await?;
    let stop_printer = CancellationToken::new();
    let printer = follow_notifications(&app.store, app.store.subscribe(), stop_printer.clone(), print_notification);

    let outcome = run_command(&app, cli.command).await;

    stop_printer.cancel();
    let _ = printer.await;
    app.shutdown().await?;
    outcome
}

async fn run_command(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Upload { files } => cmd_upload(app, files).await,
        Command::Analyze { id } => cmd_analyze(app, &id).await,
        Command::Status { format } => {
            let snapshot = app.store.snapshot().await?;
            print_status(&snapshot, format)
        }
        Command::Show { id, format } => {
            let snapshot = app.store.snapshot().await?;
            print_item(&snapshot, &id, format)
        }
        Command::Export { id, format, out } => {
            let record = app.exporter.export(&id, format, &out).await?;
            println!("{}", record.path.display());
            Ok(())
        }
        Command::Exports { format } => {
            let records = app.exporter.history()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                OutputFormat::Text => {
                    if records.is_empty() {
                        println!("No exports yet");
                    }
                    for r in &records {
                        println!(
                            "{}  {:<30} {:<5} {:>8} B  {:>3} objects  {}",
                            r.exported_at.format("%Y-%m-%d %H:%M:%S"),
                            r.file_name,
                            r.format.as_str().to_uppercase(),
                            r.size,
                            r.detection_count,
                            r.path.display()
                        );
                    }
                }
            }
            Ok(())
        }
        Command::Delete { id } => {
            app.uploads.remove_item(&id).await?;
            Ok(())
        }
        Command::Settings { command } => cmd_settings(app, command).await,
        Command::Reset { yes } => {
            if !yes {
                return Err(eyre!("Refusing to clear all data without --yes"));
            }
            app.reset_all().await
        }
        Command::Health => {
            let message = app.api().health().await.context("Detection service is unreachable")?;
            println!("{} {}", "ok".green(), message);
            Ok(())
        }
    }
}

async fn cmd_upload(app: &App, paths: Vec<PathBuf>) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(
            MediaFile::read(path)
                .await
                .context(format!("Failed to read {}", path.display()))?,
        );
    }
    let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();

    let results = app.uploads.submit_all(files).await;
    let failed = results.iter().filter(|r| r.is_err()).count();
    for (name, result) in names.iter().zip(&results) {
        if let Ok(id) = result {
            println!("{id}  {name}");
        }
    }

    if failed > 0 {
        return Err(eyre!("{} of {} uploads failed", failed, results.len()));
    }
    Ok(())
}

async fn cmd_analyze(app: &App, id: &str) -> Result<()> {
    let abort = CancellationToken::new();
    let on_ctrl_c = abort.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let outcome = app.analysis.analyze(id, abort).await;
    watcher.abort();

    let result = outcome?;
    let snapshot = app.store.snapshot().await?;
    let shown = result.filtered(&snapshot.settings).len();
    println!(
        "{}: {} objects ({} shown at confidence >= {:.2}) in {:.2}s",
        result.name, result.total_objects, shown, snapshot.settings.confidence_threshold, result.processing_time
    );
    Ok(())
}

async fn cmd_settings(app: &App, command: SettingsCommand) -> Result<()> {
    let snapshot = match command {
        SettingsCommand::Show => app.store.snapshot().await?,
        SettingsCommand::Set {
            confidence,
            classes,
            export_format,
            theme,
            max_file_size,
            quality,
        } => {
            let patch = SettingsPatch {
                confidence_threshold: confidence,
                enabled_classes: classes.map(|c| c.into_iter().filter(|s| !s.trim().is_empty()).collect()),
                export_format,
                theme,
                max_file_size_mb: max_file_size,
                processing_quality: quality,
            };
            if patch.is_empty() {
                return Err(eyre!("Nothing to change; pass at least one setting"));
            }
            app.update_settings(patch).await?
        }
        SettingsCommand::Reset => app.reset_settings().await?,
    };
    println!("{}", serde_yaml::to_string(&snapshot.settings)?);
    Ok(())
}

fn print_status(state: &AppState, format: OutputFormat) -> Result<()> {
    let stats = state.stats();
    if format == OutputFormat::Json {
        let items: Vec<serde_json::Value> = state.uploaded_items.iter().map(item_json).collect();
        let value = serde_json::json!({
            "credits": state.credits,
            "stats": stats,
            "items": items,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Credits:    {}", state.credits);
    println!(
        "Images: {}  Videos: {}  Processed: {}  Objects: {}",
        stats.total_images, stats.total_videos, stats.total_processed, stats.total_objects
    );
    println!();
    if state.uploaded_items.is_empty() {
        println!("No items uploaded");
    }
    for item in &state.uploaded_items {
        println!(
            "{:<40} {:<30} {:<6} {:<11} {:>10} B",
            item.id,
            item.name,
            item.kind.to_string(),
            colored_status(item),
            item.size
        );
    }

    let recent = state.recent_activity(RECENT_ACTIVITY_LIMIT);
    if !recent.is_empty() {
        println!();
        println!("Recent activity:");
        for r in recent {
            println!(
                "  {}  {} ({} objects)",
                r.processed_at.format("%Y-%m-%d %H:%M:%S"),
                r.name,
                r.total_objects
            );
        }
    }
    Ok(())
}

fn print_item(state: &AppState, id: &str, format: OutputFormat) -> Result<()> {
    let item = state.item(id).ok_or_else(|| eyre!("Item not found: {}", id))?;
    let result = state.result(id);

    if format == OutputFormat::Json {
        let value = serde_json::json!({
            "item": item_json(item),
            "result": result.map(|r| serde_json::json!({
                "total_objects": r.total_objects,
                "processing_time": r.processing_time,
                "processed_at": r.processed_at,
                "detections": r.filtered(&state.settings),
            })),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} ({})", item.name, item.id);
    println!("  kind:     {}", item.kind);
    println!("  size:     {} B", item.size);
    println!("  status:   {}", colored_status(item));
    println!("  uploaded: {}", item.uploaded_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(error) = &item.error {
        println!("  error:    {}", error.red());
    }
    if let Some(r) = result {
        println!("  objects:  {} in {:.2}s", r.total_objects, r.processing_time);
        let shown = r.filtered(&state.settings);
        if shown.is_empty() && !r.detections.is_empty() {
            println!("  (no detections pass the current filters)");
        }
        for d in shown {
            println!(
                "    {:<16} {:>5.1}%  [{:.0}, {:.0}, {:.0}, {:.0}]",
                d.class_name,
                d.confidence * 100.0,
                d.bbox[0],
                d.bbox[1],
                d.bbox[2],
                d.bbox[3]
            );
        }
        for (class, count) in r.class_counts() {
            println!("  {class}: {count}");
        }
    }
    Ok(())
}

/// Item as JSON without its preview payload
fn item_json(item: &UploadItem) -> serde_json::Value {
    serde_json::json!({
        "id": item.id,
        "name": item.name,
        "size": item.size,
        "kind": item.kind,
        "status": item.status,
        "uploaded_at": item.uploaded_at,
        "error": item.error,
    })
}

fn colored_status(item: &UploadItem) -> String {
    use visionflow::domain::ItemStatus;
    let label = item.status.to_string();
    match item.status {
        ItemStatus::Completed => label.green().to_string(),
        ItemStatus::Error => label.red().to_string(),
        ItemStatus::Processing | ItemStatus::Uploading => label.yellow().to_string(),
        ItemStatus::Ready => label.cyan().to_string(),
    }
}

/// Print a notification to stderr
fn print_notification(n: &Notification) {
    let label = match n.severity {
        Severity::Success => "success".green(),
        Severity::Error => "error".red(),
        Severity::Warning => "warning".yellow(),
        Severity::Info => "info".blue(),
    };
    eprintln!("[{}] {}", label, n.message);
}
