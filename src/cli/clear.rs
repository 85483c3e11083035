//! CLI `clear` command: drop every engram after user confirmation.

use anyhow::Result;

use mem42::config::Mem42Config;
use mem42::store;

/// Delete and recreate the knowledge base. Memory points are left untouched.
pub async fn clear(config: &Mem42Config) -> Result<()> {
    let (db, store) = super::open_store(config)?;

    let info = store.collection_info().await?;
    super::confirm(
        &format!(
            "This will permanently delete ALL {} engrams from the {} knowledge base.",
            info.point_count, config.storage.backend
        ),
        "clear cancelled",
    )?;

    store::clear_knowledge(
        store.as_ref(),
        &db,
        config.generation.embedding_dim,
        &config.generation.embedding_model,
    )
    .await?;

    println!("Knowledge base cleared.");
    Ok(())
}
