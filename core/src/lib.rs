//! Transaction monitoring and AML casework engine.
//!
//! The crate is organized around one SQLite store and a set of
//! detection components driven through the `AmlEngine` facade:
//!
//!   customer_scoring     five-factor customer risk model
//!   transaction_scoring  per-transaction signal blend (+ optional ML)
//!   monitoring           real-time rules R001-R007 and compounds
//!   patterns             windowed batch detectors
//!   alerts / cases       analyst workflow with audit trail
//!   reporting            CTR and SAR drafting
//!   screening            watchlist name matching

pub mod alerts;
pub mod cases;
pub mod clock;
pub mod config;
pub mod customer_scoring;
pub mod engine;
pub mod error;
pub mod ml;
pub mod monitoring;
pub mod patterns;
pub mod reporting;
pub mod risk_factors;
pub mod screening;
pub mod store;
pub mod transaction_scoring;
pub mod types;

pub use engine::AmlEngine;
pub use error::{AmlError, AmlResult};
