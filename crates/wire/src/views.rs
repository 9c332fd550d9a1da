// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-model view types that cross the wire but have no `paseo-core`
//! domain type of their own: terminal summaries, provider model/command
//! catalogs, filesystem listings, and diff payloads.

use paseo_core::{CursorPosition, TerminalId, TerminalLifecycle};
use serde::{Deserialize, Serialize};

/// Terminal listing/creation result (`§4.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSummary {
    pub id: TerminalId,
    pub cwd: String,
    pub name: String,
    pub lifecycle: TerminalLifecycle,
    pub rows: u16,
    pub cols: u16,
    pub cursor: CursorPosition,
    pub created_at_ms: u64,
}

/// An entry in a provider's `list_provider_models` catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub default: bool,
}

/// A slash-command the provider exposes for `list_commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One entry in an `explore_filesystem` directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesystemEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// One file's worth of change in a `checkout_diff_update` push, with
/// rendered hunks (`§4.6`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffFileView {
    pub path: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub additions: u32,
    pub deletions: u32,
    pub hunks: Vec<DiffHunkView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffHunkView {
    pub header: String,
    pub lines: Vec<String>,
}

impl From<&paseo_core::DiffFile> for DiffFileView {
    fn from(f: &paseo_core::DiffFile) -> Self {
        Self {
            path: f.path.clone(),
            is_new: f.is_new,
            is_deleted: f.is_deleted,
            additions: f.additions,
            deletions: f.deletions,
            hunks: f.hunks.iter().map(DiffHunkView::from).collect(),
        }
    }
}

impl From<&paseo_core::DiffHunk> for DiffHunkView {
    fn from(h: &paseo_core::DiffHunk) -> Self {
        Self { header: h.header.clone(), lines: h.lines.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_file_view_converts_from_core_type() {
        let core = paseo_core::DiffFile {
            path: "src/main.rs".into(),
            is_new: false,
            is_deleted: false,
            additions: 3,
            deletions: 1,
            hunks: vec![paseo_core::DiffHunk {
                header: "@@ -1,3 +1,3 @@".into(),
                lines: vec!["-old".into(), "+new".into()],
            }],
        };
        let view = DiffFileView::from(&core);
        assert_eq!(view.path, "src/main.rs");
        assert_eq!(view.hunks.len(), 1);
    }
}
