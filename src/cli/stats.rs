//! CLI `stats` command: print knowledge base and memory point statistics.

use anyhow::{Context, Result};

use mem42::config::Mem42Config;
use mem42::ingest::parse_tags;
use mem42::memory::store as memory_store;
use mem42::store::TagFilter;

/// Display knowledge base statistics in the terminal.
pub async fn stats(config: &Mem42Config, tags: Option<&str>) -> Result<()> {
    let (db, store) = super::open_store(config)?;

    let info = store
        .collection_info()
        .await
        .context("failed to read knowledge base info")?;

    let matching = match tags {
        Some(raw) => {
            let filter = TagFilter::new(parse_tags(raw));
            Some((filter.tags().join(", "), store.matching_count(&filter).await?))
        }
        None => None,
    };

    let (memory_points, embedding_model) = {
        let conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        (
            memory_store::count_memory_points(&conn)?,
            mem42::db::migrations::get_embedding_model(&conn)?,
        )
    };

    println!("Knowledge Base Statistics");
    println!("{}", "=".repeat(40));
    println!("  Backend:             {}", config.storage.backend);
    println!("  Engrams:             {}", info.point_count);
    match info.dimension {
        Some(dim) => println!("  Vector dimension:    {dim}"),
        None => println!("  Vector dimension:    (not set)"),
    }
    if let Some((tags, count)) = matching {
        println!("  Matching [{tags}]: {count}");
    }
    println!();
    println!("Embedding model:");
    println!("  Stored:              {}", embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:          {}", config.generation.embedding_model);
    if let Some(ref stored) = embedding_model {
        if stored != &config.generation.embedding_model {
            println!("  WARNING: model mismatch! Run `mem42 clear` and re-ingest documents.");
        }
    }
    println!();
    println!("Memory points:         {memory_points}");

    Ok(())
}
