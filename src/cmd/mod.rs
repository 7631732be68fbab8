//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                          |
//! |-----------|-------------------------------------------|
//! | `board`   | `Show`, `Watch`, `Move`, `More`, `Add`    |
//! | `config`  | `Config`                                  |
//! | `render`  | terminal output shared by the above       |

pub mod board;
pub mod config;
pub mod render;

pub use board::{cmd_add, cmd_more, cmd_move, cmd_show, cmd_watch};
pub use config::cmd_config;
