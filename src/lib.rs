//! Stockroom API Library
//!
//! Core services for warehouse document management: inventory documents
//! (incoming receipts, transfers, production orders), the stock ledger that
//! keeps per-warehouse balances consistent, and document numbering.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;
