//! # bluecarbon-cli
//!
//! Terminal client of the BlueCarbon credit registry.

#[macro_use]
extern crate tracing;

pub mod args;
pub mod cmd;
pub mod errors;
pub mod handler;
pub mod opts;
pub mod sink;
pub mod utils;
