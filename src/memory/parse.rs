//! Parser for the memory-point reply format.
//!
//! The extraction prompt asks the model to answer as
//!
//! ```text
//! Summary:
//! <free text>
//! Tags:
//! <comma-separated tags>
//! Image Prompt:
//! <free text>
//! ```
//!
//! Each field is parsed independently: a section runs from its marker to the next
//! marker present. A missing marker only costs that field, which falls back to a
//! fixed placeholder (or no tags).

use super::types::MemoryDraft;

pub const SUMMARY_FALLBACK: &str = "Could not parse summary.";
pub const IMAGE_PROMPT_FALLBACK: &str = "Could not parse image prompt.";

const SUMMARY: &str = "Summary:";
const TAGS: &str = "Tags:";
const IMAGE_PROMPT: &str = "Image Prompt:";

/// Text after the first `marker`, up to whichever of `followers` comes next (or the
/// end of the reply when none of them follow).
fn section<'a>(text: &'a str, marker: &str, followers: &[&str]) -> Option<&'a str> {
    let from = text.find(marker)? + marker.len();
    let rest = &text[from..];
    let to = followers
        .iter()
        .filter_map(|f| rest.find(f))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..to].trim())
}

/// Split a comma-separated tag list, trimming and dropping empty entries.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_memory_point(raw: &str) -> MemoryDraft {
    let summary = section(raw, SUMMARY, &[TAGS, IMAGE_PROMPT]);
    let tags = section(raw, TAGS, &[IMAGE_PROMPT]);
    let image_prompt = section(raw, IMAGE_PROMPT, &[]);

    if summary.is_none() || tags.is_none() || image_prompt.is_none() {
        tracing::warn!(
            summary = summary.is_some(),
            tags = tags.is_some(),
            image_prompt = image_prompt.is_some(),
            "memory point reply only partially parsed"
        );
    }

    MemoryDraft {
        summary: summary.unwrap_or(SUMMARY_FALLBACK).to_string(),
        tags: tags.map(split_tags).unwrap_or_default(),
        image_prompt: image_prompt.unwrap_or(IMAGE_PROMPT_FALLBACK).to_string(),
    }
}
