//! # png-param-cleaner
//!
//! Clean the `parameters` text chunk that image-generation tools embed in PNG
//! files (the generation prompt and settings). Characters in a fixed
//! substitution table are replaced by ASCII approximations, characters below
//! the threshold pass through, and anything else becomes a `U`+hex escape.
//! Pixel data is copied through untouched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use png_param_cleaner::config::Config;
//! use png_param_cleaner::pipeline::{BatchOptions, run_batch};
//! use png_param_cleaner::report::ConsoleReporter;
//! use png_param_cleaner::transliterate::Transliterator;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let transliterator = Transliterator::from_config(&config)?;
//!     let options = BatchOptions::from_config(&config, false);
//!     let mut reporter = ConsoleReporter::stdout();
//!
//!     let report = run_batch(
//!         Path::new("./renders"),
//!         Path::new("./cleaned"),
//!         &options,
//!         &transliterator,
//!         &mut reporter,
//!     )?;
//!     println!("{} cleaned, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`png_text`] — PNG text-chunk reading and writing
//! - [`pipeline`] — Single-image cleaner and batch driver
//! - [`report`] — Unusual-character and progress notices
//! - [`transliterate`] — Substitution table and transliterator

pub mod config;
pub mod pipeline;
pub mod png_text;
pub mod report;
pub mod transliterate;
