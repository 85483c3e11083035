//! CLI `ingest` command: turn local text files into engrams.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use mem42::config::Mem42Config;
use mem42::ingest::{parse_tags, Document};

/// Ingest every given file (directories are expanded one level) with a progress bar.
pub async fn ingest(config: Mem42Config, paths: &[PathBuf], tags: Option<&str>) -> Result<()> {
    let files = collect_files(paths)?;
    anyhow::ensure!(!files.is_empty(), "no files to ingest");

    let tags = parse_tags(tags.unwrap_or(""));
    let state = crate::server::setup_shared_state(config)?;
    let ingestor = state.ingestor();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let mut successful = 0usize;
    let mut errors = Vec::new();
    for path in &files {
        let name = display_name(path);
        pb.set_message(name.clone());

        let result = match tokio::fs::read_to_string(path).await {
            Ok(text) => ingestor
                .ingest_document(&Document { name: name.clone(), text }, &tags)
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(anyhow::Error::from(e).context("failed to read file")),
        };

        match result {
            Ok(id) => {
                successful += 1;
                pb.println(format!("  stored {name} as {id}"));
            }
            Err(e) => {
                pb.println(format!("  FAILED {name}: {e:#}"));
                errors.push(name);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("Processed {}/{} files.", successful, files.len());
    if !errors.is_empty() {
        println!("Failed: {}", errors.join(", "));
    }
    Ok(())
}

fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries = std::fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect::<Vec<_>>();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
