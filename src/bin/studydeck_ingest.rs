//! Command-line ingestion.
//!
//! Runs the same pipeline as the HTTP server over local files. Each argument may be a PDF or a
//! directory, which is walked recursively for `*.pdf` files. One JSON object is printed per file.
use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::json;
use studydeck::{
    config::Config,
    ingestion::{IngestionApi, IngestionService, RawDocument},
    logging,
};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "studydeck-ingest",
    about = "Extract, summarize and embed local PDF files"
)]
struct Cli {
    /// PDF files or directories to ingest.
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Number of summary sections per document (1-10).
    #[arg(long)]
    summary_count: Option<usize>,
    /// Only run extraction and print the recovered text.
    #[arg(long)]
    extract_only: bool,
    /// Do not descend further than this many directory levels.
    #[arg(long)]
    max_depth: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing_with_default("warn");

    let config = Config::from_env().context("failed to load configuration")?;
    let service =
        IngestionService::from_config(&config).context("failed to initialize ingestion service")?;

    let files = collect_pdfs(&cli.paths, cli.max_depth)?;
    if files.is_empty() {
        bail!("no PDF files found");
    }

    let mut stdout = std::io::stdout().lock();
    let mut failures = 0usize;
    for path in files {
        let document = read_document(&path)?;
        let line = if cli.extract_only {
            let extracted = service.extract(document).await;
            json!({
                "path": path.display().to_string(),
                "strategy": extracted.strategy,
                "pageCount": extracted.page_count,
                "warning": extracted.warning,
                "diagnosis": extracted.diagnosis,
                "text": extracted.text,
            })
        } else {
            match service.process(document, cli.summary_count, None).await {
                Ok(processed) => json!({
                    "path": path.display().to_string(),
                    "result": processed.result,
                }),
                Err(error) => {
                    failures += 1;
                    tracing::warn!(path = %path.display(), %error, "Ingestion failed");
                    json!({
                        "path": path.display().to_string(),
                        "error": error.to_string(),
                    })
                }
            }
        };
        writeln!(stdout, "{line}").context("failed to write result")?;
    }

    if failures > 0 {
        bail!("{failures} file(s) could not be ingested");
    }
    Ok(())
}

fn collect_pdfs(paths: &[PathBuf], max_depth: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        let mut walker = WalkDir::new(path).follow_links(false).sort_by_file_name();
        if let Some(depth) = max_depth {
            walker = walker.max_depth(depth);
        }
        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
            if entry.file_type().is_file() && has_pdf_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn read_document(path: &Path) -> Result<RawDocument> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    Ok(RawDocument::new(bytes, "application/pdf", file_name))
}
