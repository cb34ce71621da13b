//! CLI output formatting
//!
//! Every command result implements [`CommandOutput`] and is printed either as
//! human-readable text or as pretty JSON (`--json`).

pub mod progress;
pub mod table;

use serde::Serialize;

pub use progress::DiscoveryProgress;
pub use table::TableFormatter;

/// Result of a CLI command, printable in both output modes
pub trait CommandOutput: Serialize {
    /// Text for terminals
    fn to_human(&self) -> String;

    /// Machine-readable form
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Print `result` to stdout in the selected mode.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
