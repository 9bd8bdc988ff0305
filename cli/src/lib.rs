// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terminal front-end for the Apexion interactive coding agent: config
//! loading, the three `Io` renderers, the built-in tool bodies, and the
//! `apexion` binary's REPL, all wired on top of `apexion-core`.

pub mod commands;
pub mod config;
pub mod io;
pub mod repl;
pub mod tools;
