//! Filesystem-safe naming
//!
//! Remote names are shared by every client, while the local mirror may live
//! on Windows, macOS or Linux. [`NameSanitizer`] produces names that are
//! valid on all three at once:
//!
//! - anything after the first `|` is dropped (`"Midterm | v2.pdf"` becomes
//!   `"Midterm"`), then whitespace is trimmed
//! - `< > : " / \ | ? *` and control characters become `-`
//! - leading dots and trailing dots or spaces are removed
//! - runs of `-` collapse and outer `-` are stripped
//! - Windows device names (`CON`, `NUL`, `COM1`, ...) get a `_` suffix
//! - names are capped at [`NameSanitizer::DEFAULT_MAX_LENGTH`] characters
//!
//! Sanitizing is deterministic and idempotent, since every path is
//! recomputed on each sync.

use std::path::MAIN_SEPARATOR;

/// Replacement for illegal characters
const REPLACEMENT: char = '-';

/// Name used when nothing survives sanitization
const EMPTY_NAME: &str = "untitled";

/// Upper bound on normalization passes
const MAX_PASSES: usize = 16;

const WINDOWS_DEVICE_NAMES: &[&str] = &["con", "prn", "aux", "nul"];

/// Converts remote names into portable path segments
#[derive(Debug, Clone)]
pub struct NameSanitizer {
    max_length: usize,
}

impl Default for NameSanitizer {
    fn default() -> Self {
        Self {
            max_length: Self::DEFAULT_MAX_LENGTH,
        }
    }
}

impl NameSanitizer {
    /// Default maximum length of a sanitized name, in characters
    pub const DEFAULT_MAX_LENGTH: usize = 100;

    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum length of a sanitized name (at least 8)
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length.max(8);
        self
    }

    /// Sanitizes a single name
    pub fn sanitize(&self, raw: &str) -> String {
        let head = raw.split('|').next().unwrap_or_default();

        let mut current = head.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.normalize(&current);
            if next == current {
                break;
            }
            current = next;
        }

        if current.is_empty() {
            EMPTY_NAME.to_string()
        } else {
            current
        }
    }

    /// Sanitizes a percent-encoded file name as reported by module items
    ///
    /// `+` and `\` are treated as spaces after decoding. Undecodable input is
    /// sanitized as is.
    pub fn sanitize_encoded(&self, raw: &str) -> String {
        let decoded = urlencoding::decode(raw)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        let spaced: String = decoded
            .chars()
            .map(|c| if c == '+' || c == '\\' { ' ' } else { c })
            .collect();
        self.sanitize(&spaced)
    }

    /// Splits a remote path on `remote_separator` and sanitizes each segment
    ///
    /// Empty segments (leading, trailing or doubled separators) are skipped.
    pub fn sanitize_segments(&self, raw_path: &str, remote_separator: char) -> Vec<String> {
        raw_path
            .split(remote_separator)
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| self.sanitize(segment))
            .collect()
    }

    /// Sanitizes a remote path and rejoins it with the local platform separator
    pub fn sanitize_path(&self, raw_path: &str, remote_separator: char) -> String {
        self.sanitize_segments(raw_path, remote_separator)
            .join(&MAIN_SEPARATOR.to_string())
    }

    /// One normalization pass
    fn normalize(&self, input: &str) -> String {
        let replaced: String = input
            .trim()
            .chars()
            .map(|c| if is_illegal(c) { REPLACEMENT } else { c })
            .collect();

        // Relative-path markers
        let leading_dots = replaced.len() - replaced.trim_start_matches('.').len();
        let mut name = if leading_dots > 0 {
            format!("{REPLACEMENT}{}", &replaced[leading_dots..])
        } else {
            replaced
        };
        name = name.trim_end_matches(['.', ' ']).to_string();

        name = collapse_replacement(&name);
        if name.chars().count() > 1 {
            name = name.trim_matches(REPLACEMENT).to_string();
        }

        if is_windows_device_name(&name) {
            name = match name.find('.') {
                Some(idx) => format!("{}_{}", &name[..idx], &name[idx..]),
                None => format!("{name}_"),
            };
        }

        if name.chars().count() > self.max_length {
            name = name.chars().take(self.max_length).collect();
        }

        name.trim().trim_end_matches(['.', ' ']).to_string()
    }
}

fn is_illegal(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || c.is_control()
}

fn collapse_replacement(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_was_replacement = false;
    for c in input.chars() {
        let is_replacement = c == REPLACEMENT;
        if !(is_replacement && previous_was_replacement) {
            out.push(c);
        }
        previous_was_replacement = is_replacement;
    }
    out
}

/// Matches `CON`, `con.txt`, `COM1`, `lpt9.log`, ...
fn is_windows_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or_default().to_ascii_lowercase();
    if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        return true;
    }
    let numbered = stem
        .strip_prefix("com")
        .or_else(|| stem.strip_prefix("lpt"));
    matches!(numbered, Some(rest) if rest.len() == 1 && rest.chars().all(|c| c.is_ascii_digit()))
}
