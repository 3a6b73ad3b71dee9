//! System prompt assembly from the workspace documents.

use chrono::{DateTime, Local};
use miniclaw_memory::MemoryStore;
use miniclaw_memory::workspace::{AGENTS_FILE, SOUL_FILE, USER_FILE};

/// Characters of HISTORY.md carried into the prompt.
pub const HISTORY_TAIL_CHARS: usize = 2000;

const TRUNCATION_MARKER: &str = "...(truncated)\n";

/// Persona, behaviour notes, runtime facts, user profile, long-term memory
/// and the tail of the history log, separated by blank lines. Missing or
/// blank documents are left out.
pub fn build_system_prompt(memory: &MemoryStore, now: DateTime<Local>) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.extend(memory.read_doc(SOUL_FILE));
    parts.extend(memory.read_doc(AGENTS_FILE));
    parts.push(format!(
        "Current time: {}\nWorkspace: {}",
        now.format("%Y-%m-%d %H:%M %Z"),
        memory.workspace().display()
    ));
    if let Some(user) = memory.read_doc(USER_FILE) {
        parts.push(format!("## About the User\n{user}"));
    }

    let long_term = memory.read_memory();
    if !long_term.trim().is_empty() {
        parts.push(format!("## Long-term Memory\n{long_term}"));
    }
    let history = memory.read_history();
    if !history.trim().is_empty() {
        parts.push(format!("## Conversation History\n{}", history_tail(&history)));
    }

    parts.join("\n\n")
}

/// The last [`HISTORY_TAIL_CHARS`] characters, marked when anything was cut.
fn history_tail(history: &str) -> String {
    let total = history.chars().count();
    if total <= HISTORY_TAIL_CHARS {
        return history.to_string();
    }
    let skip = total - HISTORY_TAIL_CHARS;
    let start = history
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(history.len());
    format!("{TRUNCATION_MARKER}{}", &history[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_history_untouched() {
        assert_eq!(history_tail("abc"), "abc");
    }

    #[test]
    fn test_long_history_keeps_tail_on_char_boundary() {
        let history = format!("{}{}", "é".repeat(10), "x".repeat(HISTORY_TAIL_CHARS));
        let tail = history_tail(&history);
        assert!(tail.starts_with(TRUNCATION_MARKER));
        assert_eq!(
            &tail[TRUNCATION_MARKER.len()..],
            "x".repeat(HISTORY_TAIL_CHARS).as_str()
        );
    }
}
