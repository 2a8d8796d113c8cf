//! Custom help formatting for consistent CLI display.

use crate::display::theme::THEME;

/// Format help text with consistent styling
pub fn format_help_section(title: &str, content: &str, indent: bool) -> String {
    let mut output = String::new();

    // Section header
    output.push_str(&format!("{}\n", THEME.paint(&THEME.heading, title)));

    // Content with optional indentation
    for line in content.lines() {
        if line.trim().is_empty() {
            output.push('\n');
        } else if indent && !line.starts_with("    ") {
            output.push_str(&format!("    {line}\n"));
        } else {
            output.push_str(&format!("{line}\n"));
        }
    }

    output
}

/// Quick start and examples appended to the top-level help
pub fn create_help_text() -> String {
    let mut help = String::new();

    let quick_start = r#"$ coderag init                      # Create .coderag/settings.toml
$ coderag stats                     # Inspect the repository index
$ coderag search "parse config"     # Natural language search"#;

    help.push_str(&format_help_section("QUICK START", quick_start, true));
    help.push('\n');

    let examples = r#"# Only TypeScript functions, at most one hit per file
$ coderag search "retry http request" --language typescript --type function --diverse --max-per-file 1

# Boost recent code tagged 'auth'
$ coderag search "validate token" --rank --boost-tag auth

# Drop embeddings of files that changed on disk
$ coderag invalidate src/auth/token.ts src/http/client.ts

# Check the index against the configured embedding model
$ coderag check"#;

    help.push_str(&format_help_section("EXAMPLES", examples, true));
    help.push('\n');

    let environment = r#"CODERAG_SEARCH__DEFAULT_K=20     Override any setting, '__' separates sections
RUST_LOG=coderag=debug           Log filter (defaults to logging.level)
NO_COLOR=1                       Disable colored output"#;

    help.push_str(&format_help_section("ENVIRONMENT", environment, true));

    help
}
