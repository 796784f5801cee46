mod crawler;
mod db;
mod discover;
mod export;
mod fetch;
mod parser;
mod quality;
mod report;
mod settings;

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;

use settings::ScrapeConfig;

#[derive(Parser)]
#[command(name = "dhamma_catalog", about = "Catalog of dhammadownload.com teachings")]
struct Cli {
    /// SQLite database path (overrides DHAMMA_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// audio, video or ebook
    #[arg(short = 't', long = "type")]
    content_type: Option<String>,
    /// Substring of the speaker name
    #[arg(short, long)]
    speaker: Option<String>,
    /// Substring of the category
    #[arg(short, long)]
    category: Option<String>,
    /// english or myanmar
    #[arg(short, long)]
    language: Option<String>,
    /// Earliest recording date
    #[arg(long)]
    from: Option<String>,
    /// Latest recording date
    #[arg(long)]
    to: Option<String>,
}

impl FilterArgs {
    fn into_filters(self) -> db::ContentFilters {
        db::ContentFilters {
            content_type: self.content_type,
            speaker: self.speaker,
            category: self.category,
            language: self.language,
            date_from: self.from,
            date_to: self.to,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the category index pages and queue teacher subpages
    Init,
    /// Fetch unvisited subpages
    Scrape {
        /// Max pages to fetch (default: all unvisited)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract speakers and media links from fetched pages
    Process {
        /// Max pages to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Scrape + process in one go
    Run {
        /// Max pages to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show crawl and catalog statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Page through the catalog, newest first
    Browse {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(short, long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "20")]
        per_page: usize,
    },
    /// Search titles, speakers, descriptions and tags
    Search {
        query: String,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Print one item as JSON
    Show { id: i64 },
    /// Change fields of one item
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        speaker: Option<String>,
        #[arg(long = "type")]
        content_type: Option<String>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        date_recorded: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// List speakers with item counts
    Speakers,
    /// List categories
    Categories,
    /// List data quality issues
    Quality {
        /// Only issues of this kind (missing_speaker, empty_title, duplicate_title, invalid_url)
        #[arg(short, long)]
        kind: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Write the catalog as CSV
    Export {
        #[arg(short, long, default_value = "data/dhamma_dataset.csv")]
        output: PathBuf,
    },
    /// Write the analytics report as markdown
    Report {
        #[arg(short, long, default_value = "data/analytics_report.md")]
        output: PathBuf,
        /// Also write the analytics as JSON to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Remove invalid rows and case-insensitive duplicate titles
    Clean,
    /// Fetch one page and print what would be extracted (no DB writes)
    Extract {
        url: String,
        /// Anchor text the page was linked with
        #[arg(short, long, default_value = "")]
        title: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut cfg = ScrapeConfig::load()?;
    if let Some(path) = cli.db {
        cfg.db_path = path;
    }
    let open = || -> Result<Connection> {
        let conn = db::connect(&cfg.db_path)?;
        db::init_schema(&conn)?;
        Ok(conn)
    };

    let result = match cli.command {
        Commands::Init => {
            let conn = open()?;
            let fetcher = fetch::Fetcher::new(&cfg)?;
            let stats = discover::discover(&conn, &fetcher, &cfg.targets).await?;
            println!(
                "Queued {} new subpages from {} index pages ({} failed)",
                stats.queued, stats.targets, stats.failed
            );
            Ok(())
        }
        Commands::Scrape { limit } => {
            let conn = open()?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first or all pages are fetched.");
                return Ok(());
            }
            println!("Fetching {} pages...", pages.len());
            let fetcher = fetch::Fetcher::new(&cfg)?;
            let stats = crawler::crawl_pages(
                &conn,
                &fetcher,
                pages,
                Duration::from_millis(cfg.request_delay_ms),
            )
            .await?;
            println!(
                "Done: {} fetched ({} ok, {} errors).",
                stats.total, stats.ok, stats.errors
            );
            Ok(())
        }
        Commands::Process { limit } => {
            let conn = open()?;
            let pages = db::fetch_unprocessed(&conn, limit)?;
            if pages.is_empty() {
                println!("No unprocessed pages. Run 'scrape' first.");
                return Ok(());
            }
            println!("Processing {} pages...", pages.len());
            let counts = process_pages(&conn, &pages)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = open()?;
            let pages = db::fetch_unvisited(&conn, limit)?;
            if pages.is_empty() {
                println!("No unvisited pages. Run 'init' first.");
                return Ok(());
            }

            let t_scrape = Instant::now();
            println!("Pipeline: fetching {} pages...", pages.len());
            let fetcher = fetch::Fetcher::new(&cfg)?;
            let stats = crawler::crawl_pages(
                &conn,
                &fetcher,
                pages,
                Duration::from_millis(cfg.request_delay_ms),
            )
            .await?;
            println!(
                "Fetched {} pages ({} ok, {} errors) in {:.1}s",
                stats.total,
                stats.ok,
                stats.errors,
                t_scrape.elapsed().as_secs_f64()
            );

            let t_process = Instant::now();
            let unprocessed = db::fetch_unprocessed(&conn, None)?;
            if unprocessed.is_empty() {
                println!("Nothing to process (all fetched pages had errors).");
                return Ok(());
            }
            println!("Processing {} pages...", unprocessed.len());
            let counts = process_pages(&conn, &unprocessed)?;
            println!("Processed in {:.1}s", t_process.elapsed().as_secs_f64());
            counts.print();
            Ok(())
        }
        Commands::Stats { json } => {
            let conn = open()?;
            let s = db::get_stats(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&s)?);
                return Ok(());
            }
            println!("Pages:      {}", s.pages);
            println!("Fetched:    {}", s.visited);
            println!("Errors:     {}", s.fetch_errors);
            println!("Processed:  {}", s.processed);
            println!("Items:      {}", s.total_content);
            print_counts("By type", &s.by_type);
            print_counts("By language", &s.by_language);
            print_counts("By source page", &s.by_source_page);
            print_counts("Top speakers", &s.top_speakers);
            Ok(())
        }
        Commands::Browse {
            filters,
            page,
            per_page,
        } => {
            let conn = open()?;
            let result = db::browse(&conn, &filters.into_filters(), page, per_page)?;
            if result.items.is_empty() {
                println!("No items found.");
                return Ok(());
            }
            print_items(&result.items);
            println!(
                "\nPage {}/{} | {} items",
                result.current_page, result.total_pages, result.total
            );
            Ok(())
        }
        Commands::Search {
            query,
            filters,
            limit,
        } => {
            let conn = open()?;
            let rows = db::search(&conn, &query, &filters.into_filters(), limit)?;
            if rows.is_empty() {
                println!("No matches for \"{}\".", query);
                return Ok(());
            }
            print_items(&rows);
            println!("\n{} matches", rows.len());
            Ok(())
        }
        Commands::Show { id } => {
            let conn = open()?;
            match db::get_content(&conn, id)? {
                Some(row) => println!("{}", serde_json::to_string_pretty(&row)?),
                None => println!("No item with id {}.", id),
            }
            Ok(())
        }
        Commands::Edit {
            id,
            title,
            speaker,
            content_type,
            language,
            category,
            tags,
            description,
            date_recorded,
            location,
        } => {
            let update = db::ContentUpdate {
                title,
                speaker,
                content_type,
                language,
                category,
                tags,
                description,
                date_recorded,
                location,
            };
            if update.is_empty() {
                anyhow::bail!("Nothing to change: pass at least one field flag");
            }
            let conn = open()?;
            if db::update_content(&conn, id, &update)? {
                println!("Updated item {}.", id);
            } else {
                println!("No item with id {}.", id);
            }
            Ok(())
        }
        Commands::Speakers => {
            let conn = open()?;
            let speakers = db::speakers(&conn)?;
            for (name, n) in &speakers {
                println!("{:>5}  {}", n, name);
            }
            println!("\n{} speakers", speakers.len());
            Ok(())
        }
        Commands::Categories => {
            let conn = open()?;
            for c in db::categories(&conn)? {
                println!("{}", c);
            }
            Ok(())
        }
        Commands::Quality { kind, limit } => {
            let conn = open()?;
            let mut issues = quality::quality_issues(&conn)?;
            if let Some(kind) = kind.as_deref() {
                issues.retain(|i| i.kind.as_str() == kind);
            }
            for (k, n) in quality::count_by_kind(&issues) {
                println!("{:<16} {}", k.as_str(), n);
            }
            issues.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.content_id.cmp(&b.content_id)));
            if !issues.is_empty() {
                println!();
                println!("{:>6} | {:<6} | {:<16} | {}", "ID", "Sev", "Kind", "Description");
                println!("{}", "-".repeat(80));
                for i in issues.iter().take(limit) {
                    println!(
                        "{:>6} | {:<6} | {:<16} | {}",
                        i.content_id,
                        i.severity.as_str(),
                        i.kind.as_str(),
                        truncate(&i.description, 60)
                    );
                }
            }
            Ok(())
        }
        Commands::Export { output } => {
            let conn = open()?;
            let rows = db::all_content(&conn)?;
            let file = create_file(&output)?;
            let n = export::write_csv(&rows, file)?;
            println!("Wrote {} records to {}", n, output.display());
            Ok(())
        }
        Commands::Report { output, json } => {
            let conn = open()?;
            let analytics = report::analyze(&conn)?;
            let now = chrono::Utc::now();
            write_file(&output, &report::render_markdown(&analytics, now))?;
            println!("Report written to {}", output.display());
            if let Some(path) = json {
                write_file(&path, &report::render_json(&analytics, now)?)?;
                println!("JSON analytics written to {}", path.display());
            }
            Ok(())
        }
        Commands::Clean => {
            let conn = open()?;
            let counts = db::clean(&conn)?;
            println!(
                "Removed {} invalid rows and {} duplicate titles.",
                counts.invalid, counts.duplicate_titles
            );
            Ok(())
        }
        Commands::Extract { url, title } => {
            let fetcher = fetch::Fetcher::new(&cfg)?;
            let html = fetcher.fetch_html(&url).await?;
            let page = db::ScrapedPage {
                page_data_id: 0,
                url: url.clone(),
                kind: "subpage".to_string(),
                title,
                section: String::new(),
                language: String::new(),
                html,
                scraped_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            };
            let extracted = parser::process_page(&page);
            if let Some(s) = &extracted.speaker {
                println!("Speaker: {:?} (via {})", s.name, s.strategy.as_str());
            }
            print_items(&extracted.content);
            println!("\n{} media links", extracted.content.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct ProcessCounts {
    pages: usize,
    items: usize,
    inserted: usize,
    subpages: usize,
    with_speaker: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Processed {} pages: {} media items ({} new), speaker found for {}/{} subpages.",
            self.pages, self.items, self.inserted, self.with_speaker, self.subpages,
        );
    }
}

fn process_pages(conn: &Connection, pages: &[db::ScrapedPage]) -> Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        pages: pages.len(),
        items: 0,
        inserted: 0,
        subpages: 0,
        with_speaker: 0,
    };

    for chunk in pages.chunks(500) {
        let results: Vec<_> = chunk.par_iter().map(parser::process_page).collect();

        let mut rows = Vec::new();
        let mut ids = Vec::with_capacity(results.len());
        for page in results {
            if let Some(speaker) = &page.speaker {
                counts.subpages += 1;
                if !speaker.name.is_empty() {
                    counts.with_speaker += 1;
                }
            }
            ids.push(page.page_data_id);
            rows.extend(page.content);
        }

        counts.items += rows.len();
        counts.inserted += db::save_content(conn, &rows, &ids)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn print_counts(label: &str, counts: &[(String, usize)]) {
    if counts.is_empty() {
        return;
    }
    println!("\n{}:", label);
    for (name, n) in counts {
        println!("  {:>6}  {}", n, truncate(name, 70));
    }
}

fn print_items(rows: &[db::ContentRow]) {
    println!(
        "{:>6} | {:<40} | {:<24} | {:<6} | {:<8}",
        "ID", "Title", "Speaker", "Type", "Language"
    );
    println!("{}", "-".repeat(96));
    for r in rows {
        let id = r.id.map(|i| i.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:>6} | {:<40} | {:<24} | {:<6} | {:<8}",
            id,
            truncate(&r.title, 40),
            truncate(r.speaker.as_deref().unwrap_or("-"), 24),
            r.content_type,
            r.language
        );
    }
}

fn create_file(path: &std::path::Path) -> Result<std::fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn write_file(path: &std::path::Path, contents: &str) -> Result<()> {
    create_file(path)?
        .write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
