// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fresh_screen_is_blank_and_cursor_at_origin() {
    let screen = Screen::new(24, 80, 0);
    let cursor = screen.cursor();
    assert_eq!(cursor.row, 0);
    assert_eq!(cursor.col, 0);
    assert!(cursor.visible);
    let grid = screen.grid();
    assert_eq!(grid.len(), 24);
    assert_eq!(grid[0].len(), 80);
}

#[test]
fn process_advances_cursor_and_writes_text() {
    let screen = Screen::new(24, 80, 0);
    screen.process(b"hi");
    let cursor = screen.cursor();
    assert_eq!(cursor.col, 2);
    let lines = screen.plain_text();
    assert_eq!(lines[0], "hi");
}

#[test]
fn resize_changes_reported_size() {
    let screen = Screen::new(24, 80, 0);
    screen.resize(40, 120);
    assert_eq!(screen.size(), (40, 120));
}
