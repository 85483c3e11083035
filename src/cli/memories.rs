//! CLI `memories` commands: list, show, delete, and clear stored memory points.

use anyhow::{bail, Result};

use mem42::config::Mem42Config;
use mem42::memory::store as memory_store;
use mem42::memory::types::MemoryPoint;

/// Print stored memory points, newest first.
pub fn list(config: &Mem42Config, limit: Option<usize>, full: bool) -> Result<()> {
    let conn = mem42::db::open_database(config.resolved_db_path())?;
    let mut points = memory_store::list_memory_points(&conn)?;

    if points.is_empty() {
        println!("No memory points stored.");
        return Ok(());
    }

    let total = points.len();
    if let Some(limit) = limit {
        points.truncate(limit);
    }
    println!("Showing {} of {} memory point(s)\n", points.len(), total);

    for point in &points {
        println!("{}", format_point(point, full));
    }

    Ok(())
}

/// Print one memory point in full, including the thought it was distilled from.
pub fn show(config: &Mem42Config, id: &str) -> Result<()> {
    let conn = mem42::db::open_database(config.resolved_db_path())?;
    let Some(point) = memory_store::get_memory_point(&conn, id)? else {
        bail!("memory point not found: {id}");
    };
    println!("{}", format_point(&point, true));
    println!("  Original thought:\n{}", indent(&point.original_thought));
    Ok(())
}

/// Delete one memory point by id.
pub fn delete(config: &Mem42Config, id: &str) -> Result<()> {
    let conn = mem42::db::open_database(config.resolved_db_path())?;
    if !memory_store::delete_memory_point(&conn, id)? {
        bail!("memory point not found: {id}");
    }
    println!("Deleted memory point {id}.");
    Ok(())
}

/// Delete every memory point after user confirmation.
pub fn clear(config: &Mem42Config) -> Result<()> {
    let conn = mem42::db::open_database(config.resolved_db_path())?;
    let count = memory_store::count_memory_points(&conn)?;
    super::confirm(
        &format!("This will permanently delete ALL {count} memory points."),
        "clear cancelled",
    )?;

    let deleted = memory_store::clear_memory_points(&conn)?;
    println!("Deleted {deleted} memory point(s).");
    Ok(())
}

fn format_point(point: &MemoryPoint, full: bool) -> String {
    let mut out = format!("[{}] {}\n", point.id, point.created_at);
    if let Some(query) = &point.query {
        out.push_str(&format!("  Query:   {}\n", truncate(query, 120)));
    }
    out.push_str(&format!("  Tags:    {}\n", point.tags.join(", ")));
    if full {
        out.push_str(&format!("  Summary:\n{}\n\n", indent(&point.summary)));
        out.push_str(&format!("  Image prompt:\n{}\n", indent(&point.image_prompt)));
    } else {
        out.push_str(&format!("  Summary: {}\n", truncate(&point.summary, 120)));
    }
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
