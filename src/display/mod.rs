//! Rich terminal display utilities for CLI output.
//!
//! Provides styled tables and formatted help for the `coderag` binary.

pub mod help;
pub mod tables;
pub mod theme;

pub use help::{create_help_text, format_help_section};
pub use tables::{
    TableBuilder, create_compatibility_table, create_coverage_table, create_optimize_table,
    create_records_table, create_results_table, create_stats_table, format_bytes,
};
pub use theme::{IndexState, SimilarityBand, Status, THEME, Theme};
