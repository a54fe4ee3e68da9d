use crate::index::engine::Engine;
use crate::index::types::Document;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Bytes inspected when sniffing for binary content
const BINARY_SNIFF_LEN: usize = 8192;

/// Options for bulk indexing a directory
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Re-index files that are already in the index
    pub force: bool,
    /// No progress output
    pub silent: bool,
    /// Only index files whose path relative to the root matches one of these globs
    pub include: Vec<String>,
}

/// Outcome of a bulk indexing run
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub indexed: usize,
    /// Already indexed, too large or binary
    pub skipped: usize,
    /// Unreadable or failed to index
    pub failed: usize,
    pub elapsed: Duration,
}

/// Result of reading one file (computed in parallel)
enum ReadOutcome {
    Ready(Document),
    Skipped,
    Failed(PathBuf, String),
}

fn is_binary(content: &[u8]) -> bool {
    content[..content.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {pattern}"))?);
    }
    Ok(Some(builder.build()?))
}

fn read_file(path: &Path, max_file_size: u64) -> ReadOutcome {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > max_file_size => return ReadOutcome::Skipped,
        Ok(_) => {}
        Err(e) => return ReadOutcome::Failed(path.to_path_buf(), e.to_string()),
    }

    let content = match fs::read(path) {
        Ok(c) => c,
        Err(e) => return ReadOutcome::Failed(path.to_path_buf(), e.to_string()),
    };
    if is_binary(&content) {
        return ReadOutcome::Skipped;
    }

    let text = String::from_utf8_lossy(&content);
    ReadOutcome::Ready(Document::from_path(path, text))
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Index every text file under `root`.
///
/// Files are read in parallel batches of `save_every` and indexed in order; the
/// engine is saved after each batch and optimized at the end. A file that
/// cannot be read or indexed is logged and counted, never fatal.
pub fn index_directory(engine: &Engine, root: &Path, options: &BuildOptions) -> Result<BuildReport> {
    let start = Instant::now();
    let root = root.canonicalize().context("Invalid path")?;
    let include = build_globset(&options.include)?;
    let config = engine.config();
    let index_dir = config.index_dir.canonicalize().unwrap_or_else(|_| config.index_dir.clone());

    let discover = (!options.silent).then(|| spinner("Discovering files..."));

    let walker = WalkBuilder::new(&root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(
                name.as_ref(),
                ".git" | "node_modules" | "target" | "__pycache__" | ".venv" | "venv"
            )
        })
        .build();

    let mut report = BuildReport::default();
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in walker.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !path.is_file() || path.starts_with(&index_dir) {
            continue;
        }
        if let Some(include) = &include {
            let rel = path.strip_prefix(&root).unwrap_or(path);
            if !include.is_match(rel) {
                continue;
            }
        }
        if !options.force && engine.is_indexed(&path.to_string_lossy()).unwrap_or(false) {
            report.skipped += 1;
            continue;
        }
        files.push(path.to_path_buf());
    }

    if let Some(spinner) = discover {
        spinner.finish_with_message(format!("Found {} files to index", files.len()));
    }

    let progress = (!options.silent).then(|| {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            pb.set_style(style.progress_chars("█▓▒░  "));
        }
        pb
    });

    let batch_size = config.save_every.max(1);
    let max_file_size = config.max_file_size;

    for batch in files.chunks(batch_size) {
        let outcomes: Vec<ReadOutcome> = batch
            .par_iter()
            .map(|path| read_file(path, max_file_size))
            .collect();

        for outcome in outcomes {
            match outcome {
                ReadOutcome::Ready(mut doc) => match engine.index_document(&mut doc, true) {
                    Ok(_) => report.indexed += 1,
                    Err(e) => {
                        warn!(file = %doc.file_name, error = %e, "failed to index file");
                        report.failed += 1;
                    }
                },
                ReadOutcome::Skipped => report.skipped += 1,
                ReadOutcome::Failed(path, reason) => {
                    warn!(file = %path.display(), error = %reason, "failed to read file");
                    report.failed += 1;
                }
            }
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        engine.save().context("Failed to save index")?;
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("Indexed {} files", report.indexed));
    }

    let finalize = (!options.silent).then(|| spinner("Optimizing index..."));
    engine.save().context("Failed to save index")?;
    engine.optimize().context("Failed to optimize index")?;
    if let Some(spinner) = finalize {
        spinner.finish_with_message("Index complete");
    }

    report.elapsed = start.elapsed();
    info!(
        indexed = report.indexed,
        skipped = report.skipped,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "bulk indexing finished"
    );
    Ok(report)
}
