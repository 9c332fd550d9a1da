// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal service: PTY ownership and VT100 screen modeling (`§4.5`).
//!
//! Owns the live grid/scrollback/cursor state that [`paseo_core::terminal`]
//! only describes the shape of. Kept as its own crate since it's the only
//! part of the host carrying a native dependency (`portable-pty`).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod pty;
mod screen;
mod service;

pub use error::TermError;
pub use pty::PtySession;
pub use screen::Screen;
pub use service::{Terminal, TerminalService};
