mod cli;

use convertforge::{
    config::{self, Config},
    packaging::{PackageOutcome, PackagingService},
    persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceBridge},
    queue::{input, AdapterSet, BatchQueue, ItemStatus, QueueEvent},
    usage::{RemoteStats, UsageTracker},
};
use convertforge_av::{ConvertedBlob, DocumentAdapter};
use convertforge_common::{formats_for, MediaKind, TargetFormat};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::broadcast;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "convertforge=trace,convertforge_av=trace".to_string()
        } else {
            "convertforge=debug,convertforge_av=debug".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Convert {
            inputs,
            to,
            quality,
            sample_rate,
            out,
            no_archive,
            workers,
            keep,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(quality) = quality {
                if !(1..=100).contains(&quality) {
                    anyhow::bail!("Quality must be between 1 and 100, got {}", quality);
                }
                config.conversion.quality = quality;
            }
            if let Some(workers) = workers {
                config.conversion.workers = workers.max(1);
            }
            if sample_rate.is_some() {
                config.conversion.sample_rate = sample_rate;
            }
            apply_packaging_overrides(&mut config, out, no_archive);
            convert_files(&config, &inputs, to, keep)
        }
        Commands::MergePdf {
            inputs,
            name,
            out,
            page_size,
            orientation,
            margin,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(page_size) = page_size {
                config.document.page_size = page_size.into();
            }
            if let Some(orientation) = orientation {
                config.document.orientation = orientation.into();
            }
            if let Some(margin) = margin {
                config.document.margin_pt = margin.max(0.0);
            }
            apply_packaging_overrides(&mut config, out, false);
            merge_pdf(&config, &inputs, &name)
        }
        Commands::Formats { kind } => list_formats(kind),
        Commands::Resume { out, no_archive } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            apply_packaging_overrides(&mut config, out, no_archive);
            resume(&config)
        }
        Commands::Stats { json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            show_stats(&config, json)
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("convertforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn apply_packaging_overrides(config: &mut Config, out: Option<PathBuf>, no_archive: bool) {
    if let Some(out) = out {
        config.packaging.output_dir = out;
    }
    if no_archive {
        config.packaging.archive = false;
    }
}

/// The store shared by the queue snapshot and the usage counters.
fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    if config.persistence.enabled {
        let dir = config.persistence.resolved_data_dir();
        match FileStore::new(&dir) {
            Ok(store) => return Arc::new(store),
            Err(e) => tracing::warn!("Failed to open data directory {:?}, keeping state in memory: {}", dir, e),
        }
    }
    Arc::new(MemoryStore::new())
}

fn build_queue(config: &Config, store: &Arc<dyn KeyValueStore>) -> BatchQueue {
    let queue = BatchQueue::new(AdapterSet::new(config.transcode_engine()))
        .with_options(config.conversion_options());

    if config.persistence.enabled {
        queue.with_persistence(PersistenceBridge::new(store.clone()))
    } else {
        queue
    }
}

fn convert_files(config: &Config, inputs: &[PathBuf], target: TargetFormat, keep: bool) -> Result<()> {
    let sources = inputs
        .iter()
        .map(|path| input::load_source(path))
        .collect::<Result<Vec<_>>>()?;

    let store = open_store(config);
    let mut queue = build_queue(config, &store);
    let reporter = spawn_reporter(&queue);

    tracing::info!("Converting {} files to {}", sources.len(), target);
    queue.add(sources, target);

    finish_batch(config, store, queue, reporter, keep)
}

fn resume(config: &Config) -> Result<()> {
    if !config.persistence.enabled {
        anyhow::bail!("Persistence is disabled; there is no interrupted batch to resume");
    }

    let store = open_store(config);
    let mut queue = build_queue(config, &store);

    let restored = queue.restore();
    if restored == 0 {
        println!("Nothing to resume.");
        return Ok(());
    }
    println!("Resuming {} queued files", restored);

    let reporter = spawn_reporter(&queue);
    finish_batch(config, store, queue, reporter, false)
}

/// Run the queue, package what converted and record usage.
fn finish_batch(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    mut queue: BatchQueue,
    reporter: JoinHandle<()>,
    keep: bool,
) -> Result<()> {
    let summary = queue.run_all_concurrent(config.conversion.workers);
    let outputs = queue.completed_outputs();

    let mut converted: HashMap<MediaKind, u64> = HashMap::new();
    for item in queue.items() {
        if item.status() == ItemStatus::Completed {
            let kind = item.source().kind().unwrap_or_else(|| item.target().kind());
            *converted.entry(kind).or_default() += 1;
        }
    }

    let failed: Vec<_> = queue
        .items()
        .iter()
        .filter(|i| i.status() == ItemStatus::Error)
        .map(|i| (i.source().name().to_string(), i.error().unwrap_or_default().to_string()))
        .collect();

    if !keep {
        queue.reset();
    }
    drop(queue);
    if reporter.join().is_err() {
        tracing::warn!("Progress reporter panicked");
    }

    println!(
        "\n{} converted, {} failed, {} skipped",
        summary.completed, summary.failed, summary.skipped
    );
    for (name, error) in &failed {
        println!("  ✗ {}: {}", name, error);
    }

    if outputs.is_empty() {
        println!("No files to download.");
        return Ok(());
    }

    let service = PackagingService::from_config(&config.packaging);
    let outcome = service.package(&outputs)?;
    print_outcome(&outcome);

    record_usage(config, store, converted, outcome.download_count() as u64);
    Ok(())
}

fn merge_pdf(config: &Config, inputs: &[PathBuf], name: &str) -> Result<()> {
    let sources = inputs
        .iter()
        .map(|path| input::load_source(path))
        .collect::<Result<Vec<_>>>()?;

    let options = config.conversion_options();
    let pdf = DocumentAdapter::build(&sources, &options.page)?;
    let blob = ConvertedBlob::real(pdf, TargetFormat::Pdf);

    let file_name = if name.to_ascii_lowercase().ends_with(".pdf") {
        name.to_string()
    } else {
        format!("{}.pdf", name)
    };

    let delivery = PackagingService::from_config(&config.packaging).download_one(&file_name, &blob);
    match &delivery.path {
        Some(path) => println!("✓ {} pages -> {}", sources.len(), path.display()),
        None => println!("✗ Failed to save {}", delivery.file_name),
    }

    let store = open_store(config);
    let mut converted = HashMap::new();
    converted.insert(MediaKind::Image, sources.len() as u64);
    record_usage(config, store, converted, u64::from(delivery.path.is_some()));
    Ok(())
}

fn record_usage(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    converted: HashMap<MediaKind, u64>,
    downloads: u64,
) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!("Failed to start runtime, usage not recorded: {}", e);
            return;
        }
    };

    let tracker = UsageTracker::new(store, RemoteStats::from_config(&config.usage));
    runtime.block_on(async {
        for (kind, count) in converted {
            if count > 0 {
                tracker.record(kind, count).await;
            }
        }
        if downloads > 0 {
            tracker.record_downloads(downloads).await;
        }
    });
}

/// Print queue events as they arrive. Ends when the queue is dropped.
fn spawn_reporter(queue: &BatchQueue) -> JoinHandle<()> {
    let mut rx = queue.subscribe();
    let mut names: HashMap<_, _> = queue
        .items()
        .iter()
        .map(|item| (item.id(), item.source().name().to_string()))
        .collect();

    std::thread::spawn(move || {
        loop {
            let event = match rx.blocking_recv() {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Progress reporter skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                QueueEvent::ItemAdded { id, file_name, .. } => {
                    names.insert(id, file_name);
                }
                QueueEvent::ItemStarted { id, target } => {
                    let name = names.get(&id).map(String::as_str).unwrap_or("file");
                    println!("→ {} to {}", name, target);
                }
                QueueEvent::ItemCompleted {
                    id,
                    output_size,
                    mime_type,
                    kind,
                } => {
                    let name = names.get(&id).map(String::as_str).unwrap_or("file");
                    let note = if kind.is_real() { "" } else { " (relabeled, not re-encoded)" };
                    println!("✓ {} ({} bytes, {}){}", name, output_size, mime_type, note);
                }
                QueueEvent::ItemFailed { id, error } => {
                    let name = names.get(&id).map(String::as_str).unwrap_or("file");
                    println!("✗ {}: {}", name, error);
                }
                _ => {}
            }
        }
    })
}

fn print_outcome(outcome: &PackageOutcome) {
    match outcome {
        PackageOutcome::Archive { delivery, entries } => match &delivery.path {
            Some(path) => println!("Saved {} files in {}", entries, path.display()),
            None => println!("✗ Failed to save {}", delivery.file_name),
        },
        PackageOutcome::Individual {
            downloads,
            archive_error,
        } => {
            if let Some(error) = archive_error {
                println!("Archive unavailable ({}), saving files individually", error);
            }
            for delivery in downloads {
                match &delivery.path {
                    Some(path) => println!("Saved {}", path.display()),
                    None => println!("✗ Failed to save {}", delivery.file_name),
                }
            }
        }
    }
}

fn list_formats(kind: Option<MediaKind>) -> Result<()> {
    let kinds: Vec<MediaKind> = match kind {
        Some(kind) => vec![kind],
        None => MediaKind::all().to_vec(),
    };

    for kind in kinds {
        println!("{}:", kind);
        for format in formats_for(kind) {
            println!("  {:<5} {:<5} {}", format.extension(), format.label(), format.mime());
        }
    }

    Ok(())
}

fn show_stats(config: &Config, json: bool) -> Result<()> {
    let tracker = UsageTracker::new(open_store(config), RemoteStats::from_config(&config.usage));
    let runtime = tokio::runtime::Runtime::new()?;
    let stats = runtime.block_on(tracker.stats());

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        let source = if stats.is_remote() { "remote" } else { "local" };
        println!("Usage ({}):", source);
        println!("  Images:    {}", stats.images);
        println!("  Audio:     {}", stats.audio);
        println!("  Video:     {}", stats.video);
        println!("  Downloads: {}", stats.downloads);
    }

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = convertforge_av::check_tools(config.transcode.ffmpeg_path.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All optional tools are available!");
    } else {
        println!("Some tools are missing. Audio and video outputs will be relabeled instead of transcoded.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config_summary(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            println!("Default config:");
            print_config_summary(&Config::default());
        }
    }

    Ok(())
}

fn print_config_summary(config: &Config) {
    println!("  Quality: {}", config.conversion.quality);
    println!("  Workers: {}", config.conversion.workers);
    println!("  Transcoding enabled: {}", config.transcode.enabled);
    println!("  Archive downloads: {}", config.packaging.archive);
    println!("  Output dir: {}", config.packaging.output_dir.display());
    println!("  Persistence enabled: {}", config.persistence.enabled);
    println!("  Remote usage: {}", config.usage.remote_enabled);
}
