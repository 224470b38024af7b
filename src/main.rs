use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use aeo_signals::db::DEFAULT_DB_PATH;
use aeo_signals::{
    run_audit, AuditStore, AuditTarget, Engine, JsonFileCrawler, MemoryStore, PageFile, RawPage,
    Settings, SqliteStore, StaticCrawler,
};

#[derive(Parser)]
#[command(name = "aeo_signals", about = "AEO/GEO signal extraction for crawled sites")]
struct Cli {
    /// Settings file (TOML, YAML or JSON); AEO_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database for audit records
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one site from a JSON page file and store the record
    Audit {
        /// Site URL
        url: String,
        /// Page file: a JSON array of pages or {"url": ..., "pages": [...]}
        #[arg(short, long)]
        pages: PathBuf,
        /// Print the record without storing it
        #[arg(long)]
        no_store: bool,
    },
    /// Extract signals from raw HTML files and print the record
    Extract {
        /// HTML files, in crawl order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Site URL; each file becomes <url>/<file stem>
        #[arg(short, long)]
        url: String,
    },
    /// Audit every page file in a directory
    Batch {
        dir: PathBuf,
        /// Run without storing records
        #[arg(long)]
        no_store: bool,
    },
    /// Recent audits
    History {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show audit statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let db_path = cli
        .db
        .clone()
        .or_else(|| settings.db_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

    let result = match cli.command {
        Commands::Audit {
            url,
            pages,
            no_store,
        } => {
            let engine = Engine::new(&settings)?;
            let store = open_store(&db_path, no_store)?;
            let crawler = JsonFileCrawler::new(pages);
            let report = run_audit(&engine, &crawler, store.as_ref(), &url).await;
            println!("{}", serde_json::to_string_pretty(&report.record)?);
            if let Some(e) = report.storage_error {
                eprintln!("Record not stored: {}", e);
            }
            Ok(())
        }
        Commands::Extract { files, url } => {
            let engine = Engine::new(&settings)?;
            let base = url.trim_end_matches('/');
            let mut pages = Vec::with_capacity(files.len());
            for path in &files {
                let bytes =
                    std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
                pages.push(RawPage::from_bytes(page_url(base, path), &bytes));
            }
            let record = engine
                .extract_for(&AuditTarget::from_url(&url), pages)
                .await;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Batch { dir, no_store } => {
            let engine = Engine::new(&settings)?;
            let store = open_store(&db_path, no_store)?;
            let files = page_files(&dir)?;
            if files.is_empty() {
                println!("No page files (*.json) in {}.", dir.display());
                return Ok(());
            }
            println!("Auditing {} sites...", files.len());
            let counts = run_batch(&engine, store.as_ref(), &files).await?;
            counts.print();
            Ok(())
        }
        Commands::History { limit } => {
            let store = SqliteStore::connect(&db_path)?;
            let rows = store.recent(limit)?;
            if rows.is_empty() {
                println!("No audits yet. Run 'audit' or 'batch' first.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<28} | {:<20} | {:>5} | {:>6} | {:<7} | {:>6} | {:<20}",
                "#", "Site", "Brand", "Pages", "Failed", "Status", "Issues", "When"
            );
            println!("{}", "-".repeat(115));

            for r in &rows {
                let status = match (r.success, r.partial) {
                    (false, _) => "failed",
                    (true, true) => "partial",
                    (true, false) => "ok",
                };
                println!(
                    "{:>4} | {:<28} | {:<20} | {:>5} | {:>6} | {:<7} | {:>6} | {:<20}",
                    r.id,
                    truncate(&r.site_id, 28),
                    truncate(&r.brand_name, 20),
                    r.pages_crawled,
                    r.pages_failed,
                    status,
                    r.issue_count,
                    r.created_at.get(..19).unwrap_or(&r.created_at),
                );
            }

            println!("\n{} audits", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let store = SqliteStore::connect(&db_path)?;
            let s = store.stats()?;
            println!("Audits:    {}", s.audits);
            println!("Sites:     {}", s.sites);
            println!("Succeeded: {}", s.succeeded);
            println!("Partial:   {}", s.partial);
            println!("Failed:    {}", s.failed);
            println!("Pages:     {}", s.pages);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_store(db_path: &Path, no_store: bool) -> anyhow::Result<Box<dyn AuditStore>> {
    if no_store {
        return Ok(Box::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;
    Ok(Box::new(store))
}

fn page_url(base: &str, path: &Path) -> String {
    match path.file_stem().and_then(|s| s.to_str()) {
        Some("index") | None => format!("{}/", base),
        Some(stem) => format!("{}/{}", base, stem),
    }
}

fn page_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

struct BatchCounts {
    ok: usize,
    partial: usize,
    failed: usize,
    skipped: usize,
    unsaved: usize,
}

impl BatchCounts {
    fn print(&self) {
        println!(
            "Audited {} sites ({} partial), {} failed, {} skipped, {} not stored.",
            self.ok + self.partial,
            self.partial,
            self.failed,
            self.skipped,
            self.unsaved,
        );
    }
}

async fn run_batch(
    engine: &Engine,
    store: &dyn AuditStore,
    files: &[PathBuf],
) -> anyhow::Result<BatchCounts> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut counts = BatchCounts {
        ok: 0,
        partial: 0,
        failed: 0,
        skipped: 0,
        unsaved: 0,
    };

    for path in files {
        let file = match PageFile::load(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                counts.skipped += 1;
                pb.inc(1);
                continue;
            }
        };
        let Some(url) = file.site_url().map(str::to_string) else {
            warn!("Skipping {}: no site URL and no pages", path.display());
            counts.skipped += 1;
            pb.inc(1);
            continue;
        };

        pb.set_message(AuditTarget::from_url(&url).site_id);
        let crawler = StaticCrawler::new(file.pages);
        let report = run_audit(engine, &crawler, store, &url).await;

        match (report.record.success, report.record.partial) {
            (false, _) => counts.failed += 1,
            (true, true) => counts.partial += 1,
            (true, false) => counts.ok += 1,
        }
        if report.storage_error.is_some() {
            counts.unsaved += 1;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
