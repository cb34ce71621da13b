//! Table output formatting for discovery results
//!
//! Ranked domain summaries and per-phase trial listings using comfy-table.

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{PhaseGroup, RankedDomain, TrialStatus};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Ranked domains, fastest first
    pub fn format_ranked_domains(&self, domains: &[RankedDomain]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Domain").add_attribute(Attribute::Bold),
            Cell::new("Best preset").add_attribute(Attribute::Bold),
            Cell::new("Speed").add_attribute(Attribute::Bold),
            Cell::new("Improvement").add_attribute(Attribute::Bold),
            Cell::new("Trials").add_attribute(Attribute::Bold),
        ]);

        for (rank, domain) in domains.iter().enumerate() {
            let preset_cell = match &domain.best_preset {
                Some(preset) if self.use_colors => Cell::new(preset).fg(Color::Green),
                Some(preset) => Cell::new(preset),
                None if self.use_colors => Cell::new("none").fg(Color::Red),
                None => Cell::new("none"),
            };

            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(truncate(&domain.domain, 40)),
                preset_cell,
                Cell::new(domain.best_speed.map_or_else(|| "-".to_string(), format_speed))
                    .set_alignment(CellAlignment::Right),
                self.improvement_cell(domain.improvement),
                Cell::new(format!("{}/{}", domain.succeeded, domain.trials))
                    .set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }

    /// Trials of one domain, one section per non-empty phase
    pub fn format_phase_groups(&self, groups: &[PhaseGroup]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Phase").add_attribute(Attribute::Bold),
            Cell::new("Preset").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Speed").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
            Cell::new("Error").add_attribute(Attribute::Bold),
        ]);

        for group in groups.iter().filter(|group| !group.trials.is_empty()) {
            for trial in &group.trials {
                let status_cell = match (trial.status, self.use_colors) {
                    (TrialStatus::Complete, true) => Cell::new("ok").fg(Color::Green),
                    (TrialStatus::Failed, true) => Cell::new("failed").fg(Color::Red),
                    (TrialStatus::Complete, false) => Cell::new("✓ ok"),
                    (TrialStatus::Failed, false) => Cell::new("✗ failed"),
                };

                table.add_row(vec![
                    Cell::new(group.phase.as_str()),
                    Cell::new(&trial.preset_name),
                    status_cell,
                    Cell::new(format_speed(trial.speed)).set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.1}s", trial.duration / 1000.0))
                        .set_alignment(CellAlignment::Right),
                    Cell::new(truncate(trial.error.as_deref().unwrap_or(""), 40)),
                ]);
            }
        }

        table.to_string()
    }

    fn improvement_cell(&self, improvement: Option<f64>) -> Cell {
        let Some(value) = improvement else {
            return Cell::new("-").set_alignment(CellAlignment::Right);
        };

        let cell = Cell::new(format!("{value:+.1}%")).set_alignment(CellAlignment::Right);
        match (self.use_colors, value >= 0.0) {
            (true, true) => cell.fg(Color::Green),
            (true, false) => cell.fg(Color::Red),
            (false, _) => cell,
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

/// Bytes per second in binary units, e.g. `1.0 MiB/s`
pub fn format_speed(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 4] = ["B/s", "KiB/s", "MiB/s", "GiB/s"];

    let mut value = bytes_per_sec.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
