// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Three concrete `Io` port implementations (§6, SPEC_FULL §6 added
//! notes): an interactive terminal renderer, a plain non-tty fallback,
//! and a pipe/CI renderer that auto-approves and emits JSONL.

pub mod interactive;
pub mod pipe;
pub mod plain;

pub use interactive::InteractiveIo;
pub use pipe::PipeIo;
pub use plain::PlainIo;

/// Picks `InteractiveIo` when stdin/stdout are both a tty, `PlainIo`
/// otherwise. Call sites that want the JSONL pipe renderer construct
/// `PipeIo` explicitly (it's an opt-in `--print` flag, not auto-detected).
pub fn default_for_terminal() -> std::sync::Arc<dyn apexion_core::domain::io::Io> {
    if atty_stdin_and_stdout() {
        std::sync::Arc::new(InteractiveIo::new())
    } else {
        std::sync::Arc::new(PlainIo::new())
    }
}

fn atty_stdin_and_stdout() -> bool {
    use std::io::IsTerminal;
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
