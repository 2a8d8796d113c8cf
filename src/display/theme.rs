//! Terminal styling for index and search output.
//!
//! Scores are colored by similarity band and index states by how usable the
//! index is for the configured provider. Everything falls back to plain text
//! when `NO_COLOR` is set or stdout is not a terminal.

use crate::semantic::thresholds;
use crate::storage::CompatibilityCheck;
use crate::types::CodeEmbedding;
use console::{Color, Style};
use std::sync::LazyLock;

pub static THEME: LazyLock<Theme> = LazyLock::new(Theme::default);

/// Outcome shown in front of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Fail,
}

impl Status {
    fn icon(self) -> &'static str {
        match self {
            Self::Ok => "✓",
            Self::Warn => "⚠",
            Self::Fail => "✗",
        }
    }
}

/// How close a similarity score is to the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityBand {
    VerySimilar,
    Similar,
    Related,
    Weak,
}

impl SimilarityBand {
    pub fn of(similarity: f32) -> Self {
        if similarity >= thresholds::VERY_SIMILAR {
            Self::VerySimilar
        } else if similarity >= thresholds::SIMILAR {
            Self::Similar
        } else if similarity >= thresholds::RELATED {
            Self::Related
        } else {
            Self::Weak
        }
    }

    /// Terminal color of the band, shared with table cells
    pub fn color(self) -> Color {
        match self {
            Self::VerySimilar => Color::Green,
            Self::Similar => Color::Cyan,
            Self::Related => Color::Yellow,
            Self::Weak => Color::Color256(244),
        }
    }
}

/// Whether an index can serve queries from the configured provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Compatible,
    /// Same dimensions, different provider: results are degraded
    Degraded,
    RebuildRequired,
}

impl IndexState {
    pub fn of(check: &CompatibilityCheck) -> Self {
        match (check.compatible, check.requires_rebuild) {
            (true, _) => Self::Compatible,
            (false, false) => Self::Degraded,
            (false, true) => Self::RebuildRequired,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Compatible => "compatible",
            Self::Degraded => "different provider",
            Self::RebuildRequired => "rebuild required",
        }
    }

    pub fn status(self) -> Status {
        match self {
            Self::Compatible => Status::Ok,
            Self::Degraded => Status::Warn,
            Self::RebuildRequired => Status::Fail,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Theme {
    pub ok: Style,
    pub warn: Style,
    pub fail: Style,
    pub heading: Style,
    /// Suggestions and other secondary text
    pub muted: Style,
    /// `source:start-end` locations
    pub location: Style,
    pub symbol: Style,
    /// Counts and timings
    pub metric: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            ok: Style::new().green(),
            warn: Style::new().yellow(),
            fail: Style::new().red().bold(),
            heading: Style::new().cyan().bold(),
            muted: Style::new().dim(),
            location: Style::new().magenta(),
            symbol: Style::new().yellow(),
            metric: Style::new().cyan(),
        }
    }
}

impl Theme {
    pub fn colors_enabled() -> bool {
        use is_terminal::IsTerminal;
        std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
    }

    /// Icon plus message, colored by outcome
    pub fn status(&self, status: Status, text: &str) -> String {
        let style = match status {
            Status::Ok => &self.ok,
            Status::Warn => &self.warn,
            Status::Fail => &self.fail,
        };
        self.paint(style, format!("{} {text}", status.icon()))
    }

    /// Score with three decimals, colored by similarity band
    pub fn similarity(&self, similarity: f32) -> String {
        let style = Style::new().fg(SimilarityBand::of(similarity).color());
        self.paint(&style, format!("{similarity:.3}"))
    }

    /// `id (source:start-end)` of a stored record
    pub fn record(&self, record: &CodeEmbedding) -> String {
        format!(
            "{} ({})",
            self.paint(&self.symbol, &record.id),
            self.paint(&self.location, record.location())
        )
    }

    /// One line verdict for a compatibility check
    pub fn index_state(&self, check: &CompatibilityCheck) -> String {
        let state = IndexState::of(check);
        match &check.reason {
            Some(reason) => self.status(state.status(), &format!("{}: {reason}", state.label())),
            None => self.status(state.status(), state.label()),
        }
    }

    pub fn paint<T: std::fmt::Display>(&self, style: &Style, text: T) -> String {
        if Self::colors_enabled() {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}
