//! Every shape of loader block this plugin has ever written into `index.html`.
//!
//! The table is applied in order. Each matcher also swallows the whitespace
//! left on its line so repeated upgrades do not accumulate blank lines.

use super::block::{END_MARKER, START_MARKER};
use regex::Regex;
use std::ops::Range;

enum Matcher {
    Regex(Regex),
    /// A start marker paired with the nearest end marker, never across another start marker.
    Delimited,
}

pub struct LegacyPattern {
    pub name: &'static str,
    pub description: &'static str,
    matcher: Matcher,
}

impl LegacyPattern {
    fn regex(name: &'static str, description: &'static str, core: &str) -> Self {
        let regex = Regex::new(&format!(r"(?:{})[ \t]*(?:\r?\n)?", core))
            .unwrap_or_else(|e| panic!("invalid built-in pattern {}: {}", name, e));
        Self {
            name,
            description,
            matcher: Matcher::Regex(regex),
        }
    }

    fn delimited(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            matcher: Matcher::Delimited,
        }
    }

    /// Byte ranges of every match, in order and non-overlapping.
    pub fn find_spans(&self, text: &str) -> Vec<Range<usize>> {
        match &self.matcher {
            Matcher::Regex(regex) => regex.find_iter(text).map(|m| m.range()).collect(),
            Matcher::Delimited => delimited_spans(text),
        }
    }

    pub fn count(&self, text: &str) -> usize {
        self.find_spans(text).len()
    }

    pub fn is_match(&self, text: &str) -> bool {
        !self.find_spans(text).is_empty()
    }

    pub fn remove_all(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for span in self.find_spans(text) {
            out.push_str(&text[last..span.start]);
            last = span.end;
        }
        out.push_str(&text[last..]);
        out
    }
}

fn delimited_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(found) = text[cursor..].find(START_MARKER) {
        let start = cursor + found;
        let inner = start + START_MARKER.len();
        let end = text[inner..].find(END_MARKER).map(|i| inner + i);
        let next_start = text[inner..].find(START_MARKER).map(|i| inner + i);

        match end {
            Some(end) if next_start.map_or(true, |next| end < next) => {
                let close = end + END_MARKER.len();
                let stop = close + trailing_len(&text[close..]);
                spans.push(start..stop);
                cursor = stop;
            }
            _ => {
                log::warn!(
                    "[Patch] Leaving unterminated {} at byte {} untouched",
                    START_MARKER,
                    start
                );
                cursor = inner;
            }
        }
    }
    spans
}

// Spaces and tabs, then at most one line break.
fn trailing_len(rest: &str) -> usize {
    let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let after = &rest[blanks..];
    if after.starts_with("\r\n") {
        blanks + 2
    } else if after.starts_with('\n') {
        blanks + 1
    } else {
        blanks
    }
}

lazy_static::lazy_static! {
    pub static ref LEGACY_PATTERNS: Vec<LegacyPattern> = vec![
        LegacyPattern::delimited(
            "delimited-block",
            "comment-delimited block (current scheme)",
        ),
        LegacyPattern::regex(
            "split-loader",
            "undelimited public.js tag plus inline private loader (v1.1)",
            r#"<script defer src="/JavaScriptInjector/public\.js"></script>\s*<script>(?:[^<]|<[^/])*?clearInterval\(authInterval\);[\s\S]*?</script>"#,
        ),
        LegacyPattern::regex(
            "single-loader",
            "single loader.js script tag (v1.0)",
            r"<script[^>]*JavaScriptInjector/loader\.js[^>]*>[^<]*</script>",
        ),
    ];
}

/// The matcher for the current delimiter scheme.
pub fn delimited() -> &'static LegacyPattern {
    &LEGACY_PATTERNS[0]
}

/// The undelimited shapes written by older releases.
pub fn undelimited() -> &'static [LegacyPattern] {
    &LEGACY_PATTERNS[1..]
}
