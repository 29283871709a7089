//! Terminal front end
//!
//! - `commands`: parses input lines and runs them against the conversation
//! - `repl`: the read-eval-print loop and event rendering

pub mod commands;
pub mod repl;
