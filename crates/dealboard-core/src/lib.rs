pub mod board;
pub mod config;
pub mod contracts;
pub mod detail;
pub mod dragdrop;
pub mod error;
pub mod expansion;
pub mod filter;
pub mod grid;
pub mod memory;
pub mod scroll;
pub mod select;
pub mod settle;
pub mod timeline;
pub mod types;

pub use types::*;
