//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{AssetCommands, GraphFormat};
use crate::api;
use crate::build::{BatchReport, BuildCancel, BuildProgress, BuildResult};
use crate::vault::Vault;
use serde::Serialize;
use std::path::Path;
use texvault_core::{GraphView, Index, VaultError, write_atomic};
use tokio::sync::mpsc;

/// Capacity of the progress channel between the orchestrator and the printer.
const PROGRESS_BUFFER: usize = 64;

fn print_json<T: Serialize>(value: &T) -> Result<(), VaultError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| VaultError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Load the index, building it first if it has never been built.
fn load_or_build_index(vault: &Vault) -> Result<Index, VaultError> {
    let indexer = vault.indexer();
    if !indexer.index_exists() {
        tracing::info!("no index yet, building one");
        indexer.reindex()?;
    }
    indexer.load_index()
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create the vault skeleton.
pub fn cmd_init(root: &Path, force: bool, json_mode: bool) -> Result<(), VaultError> {
    let vault = Vault::init(root, force)?;
    let layout = vault.layout();

    if json_mode {
        print_json(&serde_json::json!({
            "root": layout.root,
            "notes": layout.notes_dir,
            "assets": layout.assets_dir,
            "output": layout.output_dir,
        }))?;
        return Ok(());
    }

    println!("Initialized vault at {}", layout.root.display());
    println!("  Notes:  {}", layout.notes_dir.display());
    println!("  Assets: {}", layout.assets_dir.display());
    println!("  PDFs:   {}", layout.output_dir.display());
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show index and asset summary.
pub fn cmd_status(vault: &Vault, json_mode: bool) -> Result<(), VaultError> {
    let notes_on_disk = vault.repository().list_headers()?.len();
    let indexer = vault.indexer();
    let indexed = indexer.index_exists();
    let index = indexer.load_index()?;
    let assets = vault.asset_store().list()?.len();
    let config = vault.config();

    if json_mode {
        print_json(&serde_json::json!({
            "vault": vault.layout().root,
            "notes": notes_on_disk,
            "indexed": indexed,
            "indexed_notes": index.note_count(),
            "connections": index.connection_count(),
            "broken_links": index.broken_link_count(),
            "orphans": index.orphans().len(),
            "last_indexed": index.last_indexed,
            "assets": assets,
            "compiler": config.compiler,
            "workers": config.workers,
        }))?;
        return Ok(());
    }

    println!("texvault Status");
    println!("===============");
    println!("Vault:    {}", vault.layout().root.display());
    println!("Compiler: {}", config.compiler);
    println!("Workers:  {}", config.workers);
    println!();
    println!("Notes:        {}", notes_on_disk);
    if indexed {
        println!("Indexed:      {} (at {})", index.note_count(), index.last_indexed);
        println!("Connections:  {}", index.connection_count());
        println!("Broken links: {}", index.broken_link_count());
        println!("Orphans:      {}", index.orphans().len());
    } else {
        println!("Indexed:      never (run `texvault reindex`)");
    }
    println!("Assets:       {}", assets);
    Ok(())
}

// =============================================================================
// INDEX COMMANDS
// =============================================================================

/// Rebuild the link graph.
pub fn cmd_reindex(vault: &Vault, json_mode: bool) -> Result<(), VaultError> {
    let stats = vault.indexer().reindex()?;

    if json_mode {
        print_json(&stats)?;
        return Ok(());
    }

    println!(
        "Indexed {} notes, {} connections",
        stats.total_notes, stats.total_connections
    );
    Ok(())
}

/// Notes that reference `slug`.
pub fn cmd_backlinks(vault: &Vault, slug: &str, json_mode: bool) -> Result<(), VaultError> {
    let index = load_or_build_index(vault)?;
    let backlinks = index
        .backlinks(slug)
        .ok_or_else(|| VaultError::NotFound(format!("note '{}'", slug)))?;

    if json_mode {
        print_json(&serde_json::json!({ "slug": slug, "backlinks": backlinks }))?;
        return Ok(());
    }

    if backlinks.is_empty() {
        println!("No notes reference '{}'", slug);
    }
    for source in backlinks {
        let title = index.notes.get(source).map_or("", |e| e.title.as_str());
        println!("{}  {}", source, title);
    }
    Ok(())
}

/// Notes `slug` references; missing targets are flagged.
pub fn cmd_links(vault: &Vault, slug: &str, json_mode: bool) -> Result<(), VaultError> {
    let index = load_or_build_index(vault)?;
    let outgoing = index
        .outgoing(slug)
        .ok_or_else(|| VaultError::NotFound(format!("note '{}'", slug)))?;

    if json_mode {
        let links: Vec<_> = outgoing
            .iter()
            .map(|t| serde_json::json!({ "target": t, "exists": index.notes.contains_key(t) }))
            .collect();
        print_json(&serde_json::json!({ "slug": slug, "links": links }))?;
        return Ok(());
    }

    if outgoing.is_empty() {
        println!("'{}' references no notes", slug);
    }
    for target in outgoing {
        match index.notes.get(target) {
            Some(entry) => println!("{}  {}", target, entry.title),
            None => println!("{}  (missing)", target),
        }
    }
    Ok(())
}

/// Export the link graph.
pub fn cmd_graph(
    vault: &Vault,
    format: GraphFormat,
    output: Option<&Path>,
) -> Result<(), VaultError> {
    let index = load_or_build_index(vault)?;
    let view = GraphView::from_index(&index);

    let rendered = match format {
        GraphFormat::Dot => view.to_dot(),
        GraphFormat::Json => serde_json::to_string_pretty(&view)
            .map_err(|e| VaultError::Serialization(e.to_string()))?,
    };

    match output {
        Some(path) => {
            write_atomic(path, rendered.as_bytes())?;
            tracing::info!(
                path = %path.display(),
                nodes = view.nodes.len(),
                edges = view.edges.len(),
                "graph exported"
            );
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// List dangling references.
pub fn cmd_broken(vault: &Vault, json_mode: bool) -> Result<(), VaultError> {
    let index = load_or_build_index(vault)?;
    let broken = index.broken_links();

    if json_mode {
        print_json(&broken)?;
        return Ok(());
    }

    if broken.is_empty() {
        println!("No broken links");
    }
    for (source, targets) in &broken {
        for target in targets {
            println!("{} -> {}", source, target);
        }
    }
    Ok(())
}

// =============================================================================
// PREPROCESS COMMAND
// =============================================================================

/// Stage one note without compiling it.
pub fn cmd_preprocess(vault: &Vault, slug: &str, json_mode: bool) -> Result<(), VaultError> {
    let staged = vault.preprocessor().process(slug)?;

    if json_mode {
        print_json(&serde_json::json!({ "slug": slug, "staged": staged }))?;
    } else {
        println!("{}", staged.display());
    }
    Ok(())
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

/// Compile one note, or the whole vault.
///
/// Exits unsuccessfully when any note failed, after printing the results.
pub async fn cmd_build(
    vault: &Vault,
    slug: Option<&str>,
    progress: bool,
    json_mode: bool,
) -> Result<(), VaultError> {
    let orchestrator = vault.orchestrator();

    if let Some(slug) = slug {
        let result = orchestrator.build_one(slug).await;
        if json_mode {
            print_json(&result)?;
        } else {
            print_result(&result);
        }
        return single_outcome(result);
    }

    let cancel = BuildCancel::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, letting running jobs finish");
                cancel.cancel("interrupted by user");
            }
        })
    };

    let report = if progress {
        let (tx, mut rx) = mpsc::channel::<BuildProgress>(PROGRESS_BUFFER);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_progress(&event, json_mode);
            }
        });
        let report = orchestrator.build_all_with_progress(&cancel, tx).await;
        if let Err(e) = printer.await {
            tracing::error!("progress printer crashed: {e}");
        }
        report
    } else {
        orchestrator.build_all(&cancel).await
    };
    interrupt.abort();
    let report = report?;

    if json_mode {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    batch_outcome(&report)
}

fn print_progress(event: &BuildProgress, json_mode: bool) {
    if json_mode {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(slug = %event.slug, "progress event not serializable: {e}"),
        }
        return;
    }
    let mark = if event.success { "ok" } else { "FAILED" };
    match &event.error {
        Some(error) => println!("[{}/{}] {} {}: {}", event.current, event.total, mark, event.slug, error),
        None => println!("[{}/{}] {} {}", event.current, event.total, mark, event.slug),
    }
}

fn print_result(result: &BuildResult) {
    match (&result.output_path, &result.error) {
        (Some(path), _) => println!("{} -> {} ({} ms)", result.slug, path.display(), result.elapsed_ms),
        (None, Some(error)) => println!("{}: {} [{}]", result.slug, error, result.state),
        (None, None) => println!("{}: {}", result.slug, result.state),
    }
    if let Some(output) = &result.compiler_output {
        println!("--- compiler output ---");
        println!("{}", output.trim_end());
    }
}

fn print_report(report: &BatchReport) {
    for result in report.results.iter().filter(|r| !r.success) {
        print_result(result);
    }
    println!();
    println!(
        "Built {} notes: {} succeeded, {} failed ({} cancelled)",
        report.total,
        report.succeeded,
        report.failed,
        report.cancelled()
    );
}

fn single_outcome(result: BuildResult) -> Result<(), VaultError> {
    if result.success {
        return Ok(());
    }
    let message = result.error.unwrap_or_default();
    Err(VaultError::CompileFailure {
        code: None,
        output: format!("{}: {}", result.slug, message),
    })
}

fn batch_outcome(report: &BatchReport) -> Result<(), VaultError> {
    if report.failed == 0 {
        return Ok(());
    }
    Err(VaultError::CompileFailure {
        code: None,
        output: format!("{} of {} notes failed", report.failed, report.total),
    })
}

// =============================================================================
// ASSET COMMANDS
// =============================================================================

/// Add, list, verify or remove attachments.
pub fn cmd_asset(vault: &Vault, command: AssetCommands, json_mode: bool) -> Result<(), VaultError> {
    let mut store = vault.asset_store();

    match command {
        AssetCommands::Add {
            file,
            name,
            description,
        } => {
            let display = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
            let stored = store.store(&file, &display, &description)?;
            if json_mode {
                print_json(&stored)?;
            } else if stored.is_duplicate {
                println!("Already stored as {}", stored.filename);
            } else {
                println!("Stored as {}", stored.filename);
            }
        }
        AssetCommands::List => {
            let assets = store.list()?;
            if json_mode {
                print_json(&assets)?;
            } else {
                for asset in &assets {
                    let short = asset.hash.get(..12).unwrap_or(&asset.hash);
                    println!("{}  {}  {}", asset.filename, short, asset.description);
                }
                println!("{} assets", assets.len());
            }
        }
        AssetCommands::Verify => {
            let report = store.verify()?;
            if json_mode {
                print_json(&report)?;
            } else {
                println!("{} ok", report.ok);
                for name in &report.missing {
                    println!("missing:  {}", name);
                }
                for name in &report.mismatched {
                    println!("modified: {}", name);
                }
            }
            if !report.is_clean() {
                return Err(VaultError::Io(format!(
                    "{} missing, {} modified assets",
                    report.missing.len(),
                    report.mismatched.len()
                )));
            }
        }
        AssetCommands::Remove { filename } => {
            let removed = store.remove(&filename)?;
            if json_mode {
                print_json(&removed)?;
            } else {
                println!("Removed {}", removed.filename);
            }
        }
    }
    Ok(())
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(vault: Vault, host: &str, port: u16) -> Result<(), VaultError> {
    println!("texvault HTTP server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Vault:    {}", vault.layout().root.display());
    println!("  Compiler: {}", vault.config().compiler);
    println!();
    println!("Endpoints:");
    println!("  GET  /health             - Health check");
    println!("  GET  /status             - Index summary");
    println!("  GET  /index              - Full index snapshot");
    println!("  GET  /notes/{{slug}}/links - Links and backlinks of a note");
    println!("  GET  /graph              - Link graph (?format=dot)");
    println!("  GET  /assets             - Stored attachments");
    println!("  POST /reindex            - Rebuild the index");
    println!("  POST /build              - Build every note");
    println!("  POST /build/{{slug}}       - Build one note");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, api::AppState::new(vault)).await
}
