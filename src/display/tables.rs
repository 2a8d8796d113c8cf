//! Table formatting utilities for structured output.

use crate::display::theme::{IndexState, SimilarityBand};
use crate::semantic::{CoverageStats, RankedEmbedding};
use crate::storage::{CompatibilityCheck, IndexMetadata, IndexStats, OptimizeReport};
use crate::types::{CodeEmbedding, EmbeddingType, ProviderDescriptor};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

/// Longest summary shown in a results row
const SUMMARY_WIDTH: usize = 60;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Add a row of prepared cells.
    pub fn add_cells(mut self, row: Vec<Cell>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Two-column metric table for an index.
pub fn create_stats_table(repository: &str, metadata: &IndexMetadata, stats: &IndexStats) -> String {
    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["Repository".to_string(), repository.to_string()])
        .add_row(vec!["Provider".to_string(), metadata.provider_name.clone()])
        .add_row(vec!["Model".to_string(), metadata.model.clone()])
        .add_row(vec!["Dimensions".to_string(), stats.dimensions.to_string()])
        .add_row(vec!["Embeddings".to_string(), stats.embedding_count.to_string()])
        .add_row(vec!["Payload size".to_string(), format_bytes(stats.total_size_bytes)])
        .add_row(vec!["File size".to_string(), format_bytes(stats.file_size_bytes)])
        .add_row(vec!["Created".to_string(), metadata.created_at.to_rfc3339()])
        .add_row(vec!["Updated".to_string(), metadata.last_updated_at.to_rfc3339()])
        .build()
}

/// Counts by type and language, followed by the modification range.
pub fn create_coverage_table(coverage: &CoverageStats) -> String {
    let mut builder = TableBuilder::new().set_headers(vec!["Group", "Value", "Embeddings"]);

    // Every type gets a row so gaps in coverage show up as zeros
    for embedding_type in EmbeddingType::ALL {
        let count = coverage.by_type.get(&embedding_type).copied().unwrap_or(0);
        builder = builder.add_row(vec![
            "type".to_string(),
            embedding_type.to_string(),
            count.to_string(),
        ]);
    }
    for (language, count) in &coverage.by_language {
        let language = if language.is_empty() {
            "<unknown>".to_string()
        } else {
            language.clone()
        };
        builder = builder.add_row(vec!["language".to_string(), language, count.to_string()]);
    }

    let date = |value: Option<chrono::DateTime<chrono::Utc>>| {
        value.map_or_else(|| "-".to_string(), |d| d.to_rfc3339())
    };

    builder
        .add_cells(vec![
            Cell::new("TOTAL").add_attribute(Attribute::Bold),
            Cell::new(""),
            Cell::new(coverage.total_embeddings).add_attribute(Attribute::Bold),
        ])
        .add_row(vec![
            "oldest".to_string(),
            date(coverage.oldest_embedding),
            String::new(),
        ])
        .add_row(vec![
            "newest".to_string(),
            date(coverage.newest_embedding),
            String::new(),
        ])
        .build()
}

/// Ranked search results.
pub fn create_results_table(results: &[RankedEmbedding]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);

    let ranked = results.iter().any(|r| r.relevance_score.is_some());
    let mut header = vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Similarity").add_attribute(Attribute::Bold),
    ];
    if ranked {
        header.push(Cell::new("Relevance").add_attribute(Attribute::Bold));
    }
    header.extend([
        Cell::new("Type").add_attribute(Attribute::Bold),
        Cell::new("Location").add_attribute(Attribute::Bold),
        Cell::new("Symbol").add_attribute(Attribute::Bold),
        Cell::new("Summary").add_attribute(Attribute::Bold),
    ]);
    table.set_header(header);

    for (rank, result) in results.iter().enumerate() {
        let record = &result.embedding;
        let mut row = vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            similarity_cell(result.similarity),
        ];
        if ranked {
            let relevance = result
                .relevance_score
                .map_or_else(|| "-".to_string(), |score| format!("{score:.3}"));
            row.push(Cell::new(relevance).set_alignment(CellAlignment::Right));
        }
        row.extend([
            Cell::new(record.embedding_type),
            Cell::new(record.location()),
            Cell::new(&record.metadata.symbol_name),
            Cell::new(truncate(summary_of(record), SUMMARY_WIDTH)),
        ]);
        table.add_row(row);
    }

    table.to_string()
}

/// Unscored records, e.g. from a file or tag lookup.
pub fn create_records_table(records: &[CodeEmbedding]) -> String {
    records
        .iter()
        .fold(
            TableBuilder::new().set_headers(vec![
                "Id",
                "Type",
                "Location",
                "Language",
                "Complexity",
                "Tags",
            ]),
            |builder, record| {
                builder.add_row(vec![
                    record.id.clone(),
                    record.embedding_type.to_string(),
                    record.location(),
                    record.metadata.language.clone(),
                    format!("{:.1}", record.metadata.complexity),
                    record
                        .metadata
                        .tags
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", "),
                ])
            },
        )
        .build()
}

/// Index metadata compared with the configured provider.
pub fn create_compatibility_table(
    check: &CompatibilityCheck,
    metadata: &IndexMetadata,
    provider: &ProviderDescriptor,
) -> String {
    let state = IndexState::of(check);
    let color = match state {
        IndexState::Compatible => Color::Green,
        IndexState::Degraded => Color::Yellow,
        IndexState::RebuildRequired => Color::Red,
    };

    TableBuilder::new()
        .set_headers(vec!["", "Index", "Configured"])
        .add_row(vec![
            "Provider".to_string(),
            check.existing_provider.clone(),
            provider.name.clone(),
        ])
        .add_row(vec![
            "Model".to_string(),
            metadata.model.clone(),
            provider.model.clone(),
        ])
        .add_row(vec![
            "Dimensions".to_string(),
            check.existing_dimensions.to_string(),
            provider.dimensions.to_string(),
        ])
        .add_cells(vec![
            Cell::new("Status"),
            Cell::new(state.label()).fg(color).add_attribute(Attribute::Bold),
            Cell::new(check.reason.as_deref().unwrap_or("")),
        ])
        .build()
}

/// Before/after sizes of an optimize run.
pub fn create_optimize_table(report: &OptimizeReport) -> String {
    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec![
            "Duplicates removed".to_string(),
            report.duplicates_removed.to_string(),
        ])
        .add_row(vec!["Size before".to_string(), format_bytes(report.bytes_before)])
        .add_row(vec!["Size after".to_string(), format_bytes(report.bytes_after)])
        .build()
}

fn similarity_cell(similarity: f32) -> Cell {
    let color = match SimilarityBand::of(similarity) {
        SimilarityBand::VerySimilar => Color::Green,
        SimilarityBand::Similar => Color::Cyan,
        SimilarityBand::Related => Color::Yellow,
        SimilarityBand::Weak => Color::DarkGrey,
    };
    Cell::new(format!("{similarity:.3}"))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

fn summary_of(record: &CodeEmbedding) -> &str {
    if record.content_summary.is_empty() {
        record.content.lines().next().unwrap_or("")
    } else {
        &record.content_summary
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(width.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

/// Human readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_table_builder() {
        let table = TableBuilder::new()
            .set_headers(vec!["Column 1", "Column 2"])
            .add_row(vec!["Value 1".to_string(), "Value 2".to_string()])
            .build();

        assert!(table.contains("Column 1"));
        assert!(table.contains("Value 1"));
    }

    #[test]
    fn test_results_table_shows_location_and_score() {
        let record = CodeEmbedding::new("e1", EmbeddingType::Function, "src/lib.rs", vec![1.0])
            .with_lines(10, 24)
            .with_symbol("parse_config")
            .with_summary("Parse the configuration file");
        let results = vec![RankedEmbedding {
            embedding: record,
            similarity: 0.8123,
            relevance_score: None,
            ranking_factors: None,
        }];

        let table = create_results_table(&results);
        assert!(table.contains("src/lib.rs:10-24"));
        assert!(table.contains("0.812"));
        assert!(table.contains("parse_config"));
        assert!(!table.contains("Relevance"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_coverage_table_lists_missing_types() {
        let coverage = CoverageStats {
            total_embeddings: 3,
            by_type: BTreeMap::from([(EmbeddingType::Function, 3)]),
            by_language: BTreeMap::from([("rust".to_string(), 3)]),
            oldest_embedding: None,
            newest_embedding: None,
        };

        let table = create_coverage_table(&coverage);
        for embedding_type in EmbeddingType::ALL {
            assert!(table.contains(embedding_type.as_str()));
        }
        assert!(table.contains("documentation"));
    }
}
