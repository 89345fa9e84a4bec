use anyhow::Result;

use crate::models::{ConvertResponse, IndexSummary, SearchResponse, StoreBackendKind};

const EXCERPT_WIDTH: usize = 72;

/// Render a `SearchResponse` in human-readable text form.
///
/// Each hit is rendered as
/// `type:object_id [relevance] excerpt`
/// after a one-line header with the page size and total match count.
pub fn print_search_text(response: &SearchResponse) -> Result<()> {
    if response.native_query.is_empty() {
        println!("query has no positive terms; nothing searched");
        return Ok(());
    }

    println!(
        "{} of {} hits for {}",
        response.hits.len(),
        response.total_count,
        response.native_query
    );

    for hit in &response.hits {
        println!(
            "{}:{} [{:.2}] {}",
            hit.content_type,
            hit.object_id,
            hit.relevance,
            excerpt(&hit.text, EXCERPT_WIDTH)
        );
    }

    Ok(())
}

pub fn print_convert_text(response: &ConvertResponse) -> Result<()> {
    println!("{}", response.native_query);
    if !response.fields.is_empty() {
        eprintln!("fields: {}", response.fields.join(", "));
    }
    Ok(())
}

/// Render an `IndexSummary` in human-readable text form.
pub fn print_index_summary_text(summary: &IndexSummary) -> Result<()> {
    let backend_str = match summary.backend {
        StoreBackendKind::Sqlite => "sqlite",
        StoreBackendKind::Memory => "memory",
    };

    println!("backend      : {backend_str}");
    println!("path         : {}", summary.path.display());
    if let Some(updated) = &summary.updated_at {
        println!("updated_at   : {updated}");
    }
    println!("documents    : {}", summary.documents);

    for count in &summary.content_types {
        println!("  {:<10} : {}", count.content_type, count.documents);
    }

    Ok(())
}

/// Single-line excerpt of `text` no wider than `max_width` characters.
fn excerpt(text: &str, max_width: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let char_count = flat.chars().count();
    if char_count <= max_width {
        flat
    } else if max_width <= 1 {
        "…".to_string()
    } else {
        flat.chars()
            .take(max_width.saturating_sub(1))
            .collect::<String>()
            + "…"
    }
}
