// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns a before/after pair of file contents into the [`DiffFile`] shape
//! clients render, using `similar`'s line-level Myers diff rather than
//! parsing `git diff`'s own textual hunk format.

use paseo_core::{DiffFile, DiffHunk};
use similar::{ChangeTag, TextDiff};

use super::git::ChangedPath;

const CONTEXT_LINES: usize = 3;

/// Builds the full [`DiffFile`] for one changed path, given its "before" and
/// "after" text (either side may be empty for an add/delete).
pub fn diff_file(changed: &ChangedPath, before: &str, after: &str) -> DiffFile {
    let text_diff = TextDiff::from_lines(before, after);
    let mut hunks = Vec::new();
    let mut additions = 0u32;
    let mut deletions = 0u32;

    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let mut lines = Vec::new();
        let (mut old_start, mut old_len, mut new_start, mut new_len) = (0usize, 0usize, 0usize, 0usize);
        for (i, op) in group.iter().enumerate() {
            let old_range = op.old_range();
            let new_range = op.new_range();
            if i == 0 {
                old_start = old_range.start;
                new_start = new_range.start;
            }
            old_len += old_range.len();
            new_len += new_range.len();
            for change in text_diff.iter_changes(op) {
                let prefix = match change.tag() {
                    ChangeTag::Delete => {
                        deletions += 1;
                        '-'
                    }
                    ChangeTag::Insert => {
                        additions += 1;
                        '+'
                    }
                    ChangeTag::Equal => ' ',
                };
                lines.push(format!("{prefix}{}", change.value().trim_end_matches('\n')));
            }
        }
        let header = format!(
            "@@ -{},{} +{},{} @@",
            old_start + 1,
            old_len,
            new_start + 1,
            new_len
        );
        hunks.push(DiffHunk { header, lines });
    }

    DiffFile {
        path: changed.path.clone(),
        is_new: changed.is_new,
        is_deleted: changed.is_deleted,
        additions,
        deletions,
        hunks,
    }
}

/// Renders a unified diff as HTML-escaped text inside a `<pre>` block, for
/// `get_highlighted_diff` (`SPEC_FULL.md` supplemented features: plain-text
/// rendering, no syntax highlighting grammar bundled).
pub fn highlighted_diff_html(file: &DiffFile) -> String {
    let mut out = String::from("<pre class=\"paseo-diff\">");
    for hunk in &file.hunks {
        out.push_str("<span class=\"hunk-header\">");
        escape_into(&mut out, &hunk.header);
        out.push_str("</span>\n");
        for line in &hunk.lines {
            let class = match line.chars().next() {
                Some('+') => "line-add",
                Some('-') => "line-del",
                _ => "line-ctx",
            };
            out.push_str("<span class=\"");
            out.push_str(class);
            out.push_str("\">");
            escape_into(&mut out, line);
            out.push_str("</span>\n");
        }
    }
    out.push_str("</pre>");
    out
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(path: &str) -> ChangedPath {
        ChangedPath { path: path.to_string(), is_new: false, is_deleted: false }
    }

    #[test]
    fn counts_additions_and_deletions() {
        let before = "a\nb\nc\n";
        let after = "a\nb2\nc\nd\n";
        let file = diff_file(&changed("f.txt"), before, after);
        assert_eq!(file.additions, 2);
        assert_eq!(file.deletions, 1);
    }

    #[test]
    fn identical_content_produces_no_hunks() {
        let text = "same\ncontent\n";
        let file = diff_file(&changed("f.txt"), text, text);
        assert!(file.hunks.is_empty());
        assert_eq!(file.additions, 0);
        assert_eq!(file.deletions, 0);
    }

    #[test]
    fn hunk_header_uses_one_based_line_numbers() {
        let before = "a\nb\nc\n";
        let after = "a\nX\nc\n";
        let file = diff_file(&changed("f.txt"), before, after);
        assert_eq!(file.hunks.len(), 1);
        assert!(file.hunks[0].header.starts_with("@@ -1,3 +1,3 @@"));
    }

    #[test]
    fn highlighted_html_escapes_angle_brackets() {
        let file = diff_file(&changed("f.txt"), "a\n", "<script>\n");
        let html = highlighted_diff_html(&file);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
