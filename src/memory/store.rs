//! Memory point persistence.
//!
//! Plain CRUD over the `memory_points` table. Tags are stored as a JSON array.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::MemoryPoint;

fn row_to_point(row: &Row<'_>) -> rusqlite::Result<(MemoryPoint, String)> {
    let tags_json: String = row.get(3)?;
    Ok((
        MemoryPoint {
            id: row.get(0)?,
            original_thought: row.get(1)?,
            summary: row.get(2)?,
            tags: Vec::new(),
            image_prompt: row.get(4)?,
            created_at: row.get(5)?,
            query: row.get(6)?,
        },
        tags_json,
    ))
}

fn with_tags((mut point, tags_json): (MemoryPoint, String)) -> Result<MemoryPoint> {
    point.tags = serde_json::from_str(&tags_json)
        .with_context(|| format!("invalid tags on memory point {}", point.id))?;
    Ok(point)
}

const SELECT_COLUMNS: &str =
    "SELECT id, original_thought, summary, tags, image_prompt, created_at, query FROM memory_points";

pub fn save_memory_point(conn: &Connection, point: &MemoryPoint) -> Result<()> {
    conn.execute(
        "INSERT INTO memory_points (id, original_thought, summary, tags, image_prompt, created_at, query)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            point.id,
            point.original_thought,
            point.summary,
            serde_json::to_string(&point.tags)?,
            point.image_prompt,
            point.created_at,
            point.query,
        ],
    )
    .context("failed to insert memory point")?;
    tracing::info!(id = %point.id, tags = point.tags.len(), "memory point saved");
    Ok(())
}

/// All memory points, newest first.
pub fn list_memory_points(conn: &Connection) -> Result<Vec<MemoryPoint>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))?;
    let points = stmt
        .query_map([], row_to_point)?
        .map(|r| with_tags(r?))
        .collect::<Result<Vec<_>>>()?;
    Ok(points)
}

pub fn get_memory_point(conn: &Connection, id: &str) -> Result<Option<MemoryPoint>> {
    let row = conn
        .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], row_to_point)
        .optional()?;
    row.map(with_tags).transpose()
}

/// Delete one memory point. Returns `false` if no such id existed.
pub fn delete_memory_point(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM memory_points WHERE id = ?1", [id])?;
    Ok(deleted > 0)
}

/// Delete every memory point. Returns the number removed.
pub fn clear_memory_points(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM memory_points", [])?;
    tracing::info!(deleted, "memory points cleared");
    Ok(deleted)
}

pub fn count_memory_points(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM memory_points", [], |r| r.get(0))?;
    Ok(count as u64)
}
