//! `mc`: drive a multichain wallet from the command line.
//!
//! The wallet is a child process speaking length-prefixed JSON-RPC over its
//! stdin/stdout. Each invocation spawns it, runs one command through a
//! [`multichain::SessionClient`], prints a result envelope, and shuts it down.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod wallet;
