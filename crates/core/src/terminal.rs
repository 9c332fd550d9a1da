// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal domain types shared between the terminal service and the hub.
//!
//! The live grid/scrollback/PTY handle live in `paseo-term`; this crate only
//! carries the identity, sizing, and color-mode types that cross the wire.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a terminal, stable for the life of the host.
    pub struct TerminalId("trm-");
}

/// Default viewport used when no subscriber supplies a size hint.
pub const DEFAULT_ROWS: u16 = 40;
pub const DEFAULT_COLS: u16 = 120;

/// Active color interpretation for a cell's foreground/background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Default = 0,
    Ansi16 = 1,
    Indexed256 = 2,
    TrueColor = 3,
}

/// SGR text attributes packed as bit flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellAttrs {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub reverse: bool,
}

/// A single character cell in the terminal grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub ch: char,
    pub fg: u32,
    pub bg: u32,
    pub fg_mode: ColorMode,
    pub bg_mode: ColorMode,
    pub attrs: CellAttrs,
}

impl Cell {
    pub fn blank() -> Self {
        Self {
            ch: ' ',
            fg: 0,
            bg: 0,
            fg_mode: ColorMode::Default,
            bg_mode: ColorMode::Default,
            attrs: CellAttrs::default(),
        }
    }
}

/// Lifecycle state of a terminal's PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalLifecycle {
    Spawning,
    Running,
    Killing,
    Dead,
}

/// Cursor position and visibility within the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
}

impl CursorPosition {
    pub fn origin() -> Self {
        Self { row: 0, col: 0, visible: true }
    }

    /// `subscribe(terminal)` guarantees the cursor lies within `rows x cols`.
    pub fn in_bounds(&self, rows: u16, cols: u16) -> bool {
        self.row < rows && self.col < cols
    }
}
