//! The `caldera` command line: run calendar queries and maintain the item
//! cache of a collection directory.

pub mod cli;
pub mod error;
