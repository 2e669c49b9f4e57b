//! End-to-end tests: fixtures on disk, a real item cache, the query
//! coordinator on top.

mod cache;
mod expand;
mod helpers;
mod query;
