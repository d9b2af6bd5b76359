//! Console output with severity tags, and the interactive-confirmation seam.
//!
//! Every user-facing line goes through [`say`] so the whole tool speaks with
//! one voice: a colored `[x]` tag followed by the message. Prompting is
//! behind the [`Confirm`] trait so the pipeline can be driven without a
//! terminal in tests.

use std::io::{self, BufRead, Write};

const RESET: &str = "\x1b[0m";

/// Message severity. Closed set; each variant carries its own color pair
/// and tag character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Hard failure.
    Fail,
    /// Something completed.
    Good,
    /// Recoverable or noteworthy condition.
    Warn,
    /// Informational.
    Info,
    /// Progress / activity.
    Log,
    /// A question the user must answer.
    Question,
}

impl Level {
    /// (bracket color, text color) as ANSI 256-color escapes.
    fn colors(self) -> (&'static str, &'static str) {
        match self {
            Level::Fail => ("\x1b[38;5;124m", "\x1b[38;5;197m"),
            Level::Good => ("\x1b[38;5;46m", "\x1b[38;5;154m"),
            Level::Warn => ("\x1b[38;5;208m", "\x1b[38;5;220m"),
            Level::Info | Level::Log => ("\x1b[38;5;51m", "\x1b[38;5;159m"),
            Level::Question => ("\x1b[38;5;63m", "\x1b[38;5;171m"),
        }
    }

    fn tag(self) -> char {
        match self {
            Level::Fail => '!',
            Level::Good | Level::Log => '+',
            Level::Warn => '-',
            Level::Info => 'i',
            Level::Question => '?',
        }
    }
}

/// Render a message with its severity prefix, without printing it.
pub fn render(level: Level, msg: &str) -> String {
    let (outer, inner) = level.colors();
    format!(
        "{outer}[{inner}{tag}{outer}]{inner} {msg}{RESET}",
        tag = level.tag()
    )
}

/// Print a severity-tagged message to stdout.
pub fn say(level: Level, msg: &str) {
    println!("{}", render(level, msg));
}

/// Capability for yes/no prompts. Injected into stages that may need to ask,
/// so tests supply canned answers instead of a terminal.
pub trait Confirm {
    /// Ask a yes/no question. Implementations default to "no".
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Asks on the real terminal: prints the prompt at Question level, reads one
/// line from stdin. Anything other than `y`/`yes` (case-insensitive) is no.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        print!("{} ", render(Level::Question, prompt));
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Answers every prompt with a fixed response. Used for `--yes` and as the
/// scripted responder in tests.
pub struct ScriptedConfirm {
    answer: bool,
    /// Prompts seen, for assertions.
    pub asked: Vec<String>,
}

impl ScriptedConfirm {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: Vec::new(),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.asked.push(prompt.to_string());
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_message_and_reset() {
        let out = render(Level::Good, "done");
        assert!(out.contains("done"));
        assert!(out.ends_with(RESET));
    }

    #[test]
    fn test_render_tags() {
        assert!(render(Level::Fail, "x").contains('!'));
        assert!(render(Level::Warn, "x").contains('-'));
        assert!(render(Level::Question, "x").contains('?'));
    }

    #[test]
    fn test_info_and_log_share_colors() {
        assert_eq!(Level::Info.colors(), Level::Log.colors());
        assert_ne!(Level::Info.tag(), Level::Log.tag());
    }

    #[test]
    fn test_scripted_confirm_records_prompts() {
        let mut c = ScriptedConfirm::new(false);
        assert!(!c.confirm("overwrite?"));
        assert!(!c.confirm("again?"));
        assert_eq!(c.asked, vec!["overwrite?", "again?"]);

        let mut yes = ScriptedConfirm::new(true);
        assert!(yes.confirm("overwrite?"));
    }
}
