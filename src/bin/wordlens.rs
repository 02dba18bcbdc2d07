//! CLI binary for wordlens.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints artifact locations and search results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wordlens::{run_pipeline, search_documents, PipelineConfig, StageFailure};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Index everything under ./data into ./artifacts
  wordlens run

  # Index a different input folder
  wordlens run ~/scans --artifacts-root ~/scans-index

  # Search the index (substring and fuzzy, case-insensitive)
  wordlens search "invoice total"

  # Stricter search: exact-ish words only
  wordlens search --no-partial --threshold 95 invoice

  # Machine-readable output
  wordlens run --json
  wordlens search --json invoice | jq '.[].page'

EXTERNAL TOOLS:
  soffice      LibreOffice, converts office documents to PDF (convert stage)
  libpdfium    PDF rasterizer, loaded from ./ or the system library path
  tesseract    OCR engine with word-level TSV output (detect stage)

ARTIFACT TREE (under --artifacts-root):
  data_transformation/documents/          converted PDFs
  data_transformation/images/{doc}/       page images, img_{n}.jpg
  data_detection/annotated_images/{doc}/  pages with every word boxed
  data_detection/output_json/final_output.json
  data_search/search_{query}.json         per-query match records
  data_search/annotated_images/{doc}/     pages with matched words boxed
"#;

/// Index scanned documents with OCR and search them by word.
#[derive(Parser, Debug)]
#[command(
    name = "wordlens",
    version,
    about = "Index scanned documents with OCR and search them by word",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root of the artifact tree.
    #[arg(long, global = true, env = "WORDLENS_ARTIFACTS", default_value = "artifacts")]
    artifacts_root: PathBuf,

    /// Output structured JSON instead of a human summary.
    #[arg(long, global = true)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "WORDLENS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "WORDLENS_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the indexing pipeline: convert, rasterize, detect.
    Run {
        /// Folder scanned for source documents.
        #[arg(default_value = "data", env = "WORDLENS_INPUT")]
        input_dir: PathBuf,

        /// Bounded worker-pool width for per-file work.
        #[arg(short, long, env = "WORDLENS_CONCURRENCY", default_value_t = 4)]
        concurrency: usize,

        /// Maximum rendered page dimension in pixels.
        #[arg(long, env = "WORDLENS_MAX_PIXELS", default_value_t = 2000)]
        max_pixels: u32,

        /// Office-converter binary.
        #[arg(long, env = "WORDLENS_SOFFICE", default_value = "soffice")]
        soffice: String,

        /// OCR binary.
        #[arg(long, env = "WORDLENS_TESSERACT", default_value = "tesseract")]
        tesseract: String,

        /// OCR language(s), e.g. eng or eng+deu.
        #[arg(long, env = "WORDLENS_LANG", default_value = "eng")]
        lang: String,

        /// Per-call timeout for external tools, in seconds.
        #[arg(long, env = "WORDLENS_TOOL_TIMEOUT", default_value_t = 120)]
        tool_timeout: u64,
    },

    /// Search the persisted index for one or more words.
    Search {
        /// Query terms, whitespace-separated.
        query: String,

        /// Minimum 0-100 similarity for a non-substring match.
        #[arg(short, long, env = "WORDLENS_THRESHOLD", default_value_t = 80)]
        threshold: u8,

        /// Disable substring matching; fuzzy scoring only.
        #[arg(long)]
        no_partial: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run {
            ref input_dir,
            concurrency,
            max_pixels,
            ref soffice,
            ref tesseract,
            ref lang,
            tool_timeout,
        } => {
            let config = PipelineConfig::builder()
                .input_dir(input_dir)
                .artifacts_root(&cli.artifacts_root)
                .concurrency(concurrency)
                .raster_max_pixels(max_pixels)
                .soffice_binary(soffice)
                .tesseract_binary(tesseract)
                .tesseract_lang(lang)
                .tool_timeout_secs(tool_timeout)
                .build()
                .context("Invalid configuration")?;

            // The pipeline logs per-stage progress to stderr; the spinner just
            // shows liveness for long silent stretches (big office files, OCR).
            let spinner = if cli.quiet || cli.json {
                None
            } else {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.set_message("Indexing…");
                bar.enable_steady_tick(Duration::from_millis(80));
                Some(bar)
            };

            let result = run_pipeline(&config).await;
            if let Some(bar) = spinner {
                bar.finish_and_clear();
            }
            let artifact = result.context("Pipeline failed")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "documents_dir": artifact.documents_dir,
                        "images_dir": artifact.images_dir,
                        "annotated_dir": artifact.annotated_dir,
                        "detection_results": artifact.detection_results,
                        "conversion_failures": artifact.conversion_failures.len(),
                        "raster_failures": artifact.raster_failures.len(),
                    })
                );
            } else if !cli.quiet {
                println!("{} Index built", green("✔"));
                println!("  documents   {}", dim(&artifact.documents_dir.display().to_string()));
                println!("  page images {}", dim(&artifact.images_dir.display().to_string()));
                println!("  annotated   {}", dim(&artifact.annotated_dir.display().to_string()));
                println!(
                    "  detections  {}",
                    bold(&artifact.detection_results.display().to_string())
                );
                print_failures("conversion", &artifact.conversion_failures);
                print_failures("raster", &artifact.raster_failures);
            }
        }

        Command::Search {
            ref query,
            threshold,
            no_partial,
        } => {
            let config = PipelineConfig::builder()
                .artifacts_root(&cli.artifacts_root)
                .fuzzy_threshold(threshold)
                .partial_match(!no_partial)
                .build()
                .context("Invalid configuration")?;

            let artifact = search_documents(&config, query)
                .await
                .context("Search failed")?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&artifact.matches)?);
            } else if !cli.quiet {
                if artifact.matches.is_empty() {
                    println!("{} No matches for \"{query}\"", cyan("◆"));
                } else {
                    for m in &artifact.matches {
                        println!(
                            "{} {}  page {:<3} {:<20} {}",
                            green("✓"),
                            bold(&m.document),
                            m.page,
                            m.word,
                            dim(&format!("term \"{}\" conf {:.2}", m.matched_term, m.confidence)),
                        );
                    }
                    println!(
                        "{} {} match(es), {} page(s) annotated",
                        green("✔"),
                        bold(&artifact.matches.len().to_string()),
                        artifact.annotated_pages,
                    );
                }
                println!("  results {}", dim(&artifact.results_path.display().to_string()));
            }
        }
    }

    Ok(())
}

fn print_failures(stage: &str, failures: &[StageFailure]) {
    for failure in failures {
        eprintln!(
            "  {} {} failed: {} {}",
            red("✗"),
            stage,
            failure.path.display(),
            dim(&failure.detail),
        );
    }
}
