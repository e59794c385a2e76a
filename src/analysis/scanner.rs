//! Generic backward log scan
//!
//! Finds the last line of a log that carries an abnormal-termination
//! marker and cuts a window of context around it. The marker list is a
//! handful of generic words; no tool-specific patterns live here.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::AnalysisConfig;
use crate::error::{FarmError, Result};

/// Lines longer than this are cut in excerpts
const MAX_LINE_CHARS: usize = 400;

/// A window of log lines around the line believed to explain a failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Excerpt {
    /// Log the excerpt was taken from
    pub source: String,
    /// 1-based line number of the marker line
    pub line_number: usize,
    /// The marker line itself
    pub line: String,
    /// 1-based line number of the first context line
    pub first_line: usize,
    /// Context lines, marker line included
    pub lines: Vec<String>,
}

impl fmt::Display for Excerpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = (self.first_line + self.lines.len()).to_string().len();
        for (offset, line) in self.lines.iter().enumerate() {
            let number = self.first_line + offset;
            let pointer = if number == self.line_number { '>' } else { ' ' };
            writeln!(f, "{} {:>width$} | {}", pointer, number, line, width = width)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LogScanner {
    /// `None` when no markers are configured; nothing ever matches then
    pattern: Option<Regex>,
    context_lines: usize,
}

impl LogScanner {
    pub fn new(markers: &[String], context_lines: usize) -> Result<Self> {
        let alternatives: Vec<String> = markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(marker_pattern)
            .collect();

        let pattern = if alternatives.is_empty() {
            None
        } else {
            let source = format!("(?i)(?:{})", alternatives.join("|"));
            Some(
                Regex::new(&source)
                    .map_err(|e| FarmError::Config(format!("invalid marker list: {}", e)))?,
            )
        };

        Ok(Self {
            pattern,
            context_lines,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        Self::new(&config.markers, config.context_lines)
    }

    pub fn is_marker_line(&self, line: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(line))
    }

    /// Scan `text` from the end and return the window around the last
    /// marker line, if any.
    pub fn scan(&self, source: &str, text: &str) -> Option<Excerpt> {
        let lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();

        let (index, line) = lines
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| self.is_marker_line(line))?;

        let start = index.saturating_sub(self.context_lines);
        let end = (index + self.context_lines + 1).min(lines.len());

        Some(Excerpt {
            source: source.to_string(),
            line_number: index + 1,
            line: clip(line),
            first_line: start + 1,
            lines: lines[start..end].iter().map(|l| clip(l)).collect(),
        })
    }
}

fn marker_pattern(marker: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let escaped = regex::escape(marker);
    let trail = if marker.ends_with(is_word) { r"\b" } else { "" };

    let mut chars = marker.chars();
    match chars.next() {
        // Also the tail of a compound identifier: `ModuleNotFoundError`,
        // `IllegalStateException`, `io_error`. A lowercase run before the
        // marker is not enough, so `terror` stays quiet.
        Some(first) if first.is_ascii_alphabetic() && marker.chars().all(is_word) => format!(
            r"(?:\b{}|_{}|(?-i:[a-z0-9]{}){}){}",
            escaped,
            escaped,
            first.to_ascii_uppercase(),
            regex::escape(chars.as_str()),
            trail
        ),
        Some(first) if is_word(first) => format!(r"\b{}{}", escaped, trail),
        _ => format!("{}{}", escaped, trail),
    }
}

fn clip(line: &str) -> String {
    if line.chars().count() <= MAX_LINE_CHARS {
        line.to_string()
    } else {
        let mut clipped: String = line.chars().take(MAX_LINE_CHARS).collect();
        clipped.push_str(" [...]");
        clipped
    }
}
