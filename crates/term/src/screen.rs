// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VT100 screen model: feeds raw PTY bytes through `vt100::Parser` and
//! projects its grid into the wire-facing [`paseo_core::Cell`] types.

use paseo_core::{Cell, CellAttrs, ColorMode, CursorPosition};
use parking_lot::Mutex;

pub struct Screen {
    parser: Mutex<vt100::Parser>,
}

impl Screen {
    pub fn new(rows: u16, cols: u16, scrollback_len: usize) -> Self {
        Self { parser: Mutex::new(vt100::Parser::new(rows, cols, scrollback_len)) }
    }

    pub fn process(&self, bytes: &[u8]) {
        self.parser.lock().process(bytes);
    }

    pub fn resize(&self, rows: u16, cols: u16) {
        self.parser.lock().set_size(rows, cols);
    }

    pub fn size(&self) -> (u16, u16) {
        self.parser.lock().screen().size()
    }

    pub fn cursor(&self) -> CursorPosition {
        let parser = self.parser.lock();
        let screen = parser.screen();
        let (row, col) = screen.cursor_position();
        CursorPosition { row, col, visible: !screen.hide_cursor() }
    }

    /// Snapshot the full visible grid as rows of [`Cell`]s.
    pub fn grid(&self) -> Vec<Vec<Cell>> {
        let parser = self.parser.lock();
        let screen = parser.screen();
        let (rows, cols) = screen.size();
        (0..rows)
            .map(|row| (0..cols).map(|col| cell_at(screen, row, col)).collect())
            .collect()
    }

    /// Plain-text rendering of the visible grid, one line per row, trailing
    /// whitespace trimmed. Used for `capture_output`-style snapshots.
    pub fn plain_text(&self) -> Vec<String> {
        let parser = self.parser.lock();
        let screen = parser.screen();
        let (rows, cols) = screen.size();
        (0..rows)
            .map(|row| {
                let mut line = String::new();
                for col in 0..cols {
                    if let Some(c) = screen.cell(row, col) {
                        let s = c.contents();
                        line.push(if s.is_empty() { ' ' } else { s.chars().next().unwrap_or(' ') });
                    } else {
                        line.push(' ');
                    }
                }
                line.trim_end().to_string()
            })
            .collect()
    }
}

fn cell_at(screen: &vt100::Screen, row: u16, col: u16) -> Cell {
    let Some(c) = screen.cell(row, col) else {
        return Cell::blank();
    };
    let (fg, fg_mode) = color(c.fgcolor());
    let (bg, bg_mode) = color(c.bgcolor());
    Cell {
        ch: c.contents().chars().next().unwrap_or(' '),
        fg,
        bg,
        fg_mode,
        bg_mode,
        attrs: CellAttrs {
            bold: c.bold(),
            italic: c.italic(),
            underline: c.underline(),
            reverse: c.inverse(),
        },
    }
}

fn color(c: vt100::Color) -> (u32, ColorMode) {
    match c {
        vt100::Color::Default => (0, ColorMode::Default),
        vt100::Color::Idx(i) => (i as u32, ColorMode::Indexed256),
        vt100::Color::Rgb(r, g, b) => {
            (((r as u32) << 16) | ((g as u32) << 8) | b as u32, ColorMode::TrueColor)
        }
    }
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
