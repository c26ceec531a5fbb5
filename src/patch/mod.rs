//! Idempotent maintenance of the loader block inside the web client's `index.html`.
//!
//! Every run re-derives the state of the file from its contents. Files are
//! read whole, transformed in memory and written whole, and nothing is written
//! when the computed text equals what is already on disk.

pub mod block;
pub mod patterns;

use crate::common::error::InjectorError;
use crate::logging;
use block::{BlockFlavor, InjectionBlock};
use std::fs;
use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "index.html";
pub const BODY_CLOSE: &str = "</body>";

/// State of a document relative to the block we want in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// No recognizable block of any known shape.
    Absent,
    /// Exactly the current block, once, and nothing older.
    Current,
    /// Some historical or outdated shape is present.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    AlreadyCurrent,
    Injected { removed: usize },
    /// Old shapes were removed but there was no `</body>` to insert before.
    MissingBodyTag { removed: usize },
}

pub fn detect_state(text: &str, block: &str) -> BlockState {
    let delimited = patterns::delimited();
    let found: Vec<&str> = delimited
        .find_spans(text)
        .into_iter()
        .map(|span| text[span].trim_end())
        .collect();
    let remainder = delimited.remove_all(text);
    let legacy = patterns::undelimited()
        .iter()
        .any(|p| p.is_match(&remainder));

    match (found.as_slice(), legacy) {
        ([], false) => BlockState::Absent,
        ([only], false) if *only == block => BlockState::Current,
        _ => BlockState::Stale,
    }
}

/// Remove every known block shape, returning the new text and the number of
/// shapes removed.
pub fn strip_known_blocks(text: &str) -> (String, usize) {
    let mut current = text.to_string();
    let mut removed = 0;
    for pattern in patterns::LEGACY_PATTERNS.iter() {
        let count = pattern.count(&current);
        if count > 0 {
            log::debug!(
                "[Patch] Removing {} occurrence(s) of {} ({})",
                count,
                pattern.name,
                pattern.description
            );
            current = pattern.remove_all(&current);
            removed += count;
        }
    }
    (current, removed)
}

/// Bring `text` to the state where it holds exactly `block` before `</body>`.
pub fn inject_block(text: &str, block: &str) -> (String, PatchOutcome) {
    if detect_state(text, block) == BlockState::Current {
        return (text.to_string(), PatchOutcome::AlreadyCurrent);
    }

    let (stripped, removed) = strip_known_blocks(text);
    match stripped.rfind(BODY_CLOSE) {
        Some(at) => {
            let mut out = String::with_capacity(stripped.len() + block.len() + 1);
            out.push_str(&stripped[..at]);
            out.push_str(block);
            out.push('\n');
            out.push_str(&stripped[at..]);
            (out, PatchOutcome::Injected { removed })
        }
        None => (stripped, PatchOutcome::MissingBodyTag { removed }),
    }
}

/// Remove the current delimited block. Older undelimited shapes are left alone.
pub fn remove_block(text: &str) -> Option<String> {
    let delimited = patterns::delimited();
    if delimited.is_match(text) {
        Some(delimited.remove_all(text))
    } else {
        None
    }
}

/// Rewrite served `index.html` contents with the transformation-flavoured block.
pub fn transform(block: &InjectionBlock, contents: &str) -> String {
    if contents.is_empty() {
        return String::new();
    }
    let (patched, outcome) = inject_block(contents, &block.render(BlockFlavor::Transformation));
    if let PatchOutcome::MissingBodyTag { .. } = outcome {
        log::warn!("[Patch] Transformed content has no {}; block not added", BODY_CLOSE);
    }
    patched
}

/// Patch engine bound to one web client directory.
#[derive(Debug, Clone)]
pub struct PatchEngine {
    index_path: PathBuf,
    block: InjectionBlock,
}

impl PatchEngine {
    pub fn new(web_path: &Path, block: InjectionBlock) -> Self {
        Self {
            index_path: web_path.join(INDEX_FILE_NAME),
            block,
        }
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Ensure the index file holds exactly one up-to-date block.
    pub fn ensure_injected(&self) -> Result<PatchOutcome, InjectorError> {
        let content = self.read_index()?;
        let (patched, outcome) = inject_block(&content, &self.block.render(BlockFlavor::Direct));

        match outcome {
            PatchOutcome::AlreadyCurrent => {
                log::info!("[Patch] Script block already up to date in {:?}", self.index_path);
            }
            PatchOutcome::Injected { removed } => {
                fs::write(&self.index_path, &patched)?;
                log::info!(
                    "[Patch] Injected script block into {:?} (removed {} old block(s))",
                    self.index_path,
                    removed
                );
                let _ = logging::write_domain_log("audit", "Injected script block into index.html");
            }
            PatchOutcome::MissingBodyTag { removed } => {
                if patched != content {
                    fs::write(&self.index_path, &patched)?;
                }
                log::warn!(
                    "[Patch] Could not find {} in {:?}. Scripts not injected (removed {} old block(s)).",
                    BODY_CLOSE,
                    self.index_path,
                    removed
                );
            }
        }
        Ok(outcome)
    }

    /// Remove the delimited block from the index file. Returns whether it was present.
    pub fn ensure_removed(&self) -> Result<bool, InjectorError> {
        let content = self.read_index()?;
        match remove_block(&content) {
            Some(cleaned) => {
                fs::write(&self.index_path, cleaned)?;
                log::info!("[Patch] Removed script block from {:?}", self.index_path);
                let _ = logging::write_domain_log("audit", "Removed script block from index.html");
                Ok(true)
            }
            None => {
                log::debug!("[Patch] No script block present in {:?}", self.index_path);
                Ok(false)
            }
        }
    }

    fn read_index(&self) -> Result<String, InjectorError> {
        fs::read_to_string(&self.index_path).map_err(|e| {
            log::error!(
                "[Patch] Could not read index.html at {:?}: {}",
                self.index_path,
                e
            );
            InjectorError::Io(e)
        })
    }
}
