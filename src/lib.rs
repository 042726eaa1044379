//! # TP Benchmark
//!
//! An automated transfer-pricing comparables screening pipeline: scrape each
//! candidate company's website, ask an LLM whether the company is an
//! independent, functionally-comparable business, and produce an annotated
//! spreadsheet plus screenshot evidence with the cited text highlighted.
//!
//! ## Architecture
//!
//! The pipeline runs one company at a time:
//! 1. **Scrape**: home page + one navigation-keyword link, with parked-domain
//!    detection, in an isolated worker process
//! 2. **Classify**: Gemini-protocol LLM with an ordered backend fallback list
//! 3. **Evidence**: re-locate the LLM's quoted phrase in the live page with a
//!    whitespace/tag-tolerant search, highlight it, stamp an audit banner,
//!    and capture a full-page screenshot, in another worker process
//! 4. **Decide**: business rules annotate the row as accepted or rejected
//!
//! All browser-driving code lives behind the worker process boundary
//! (`tp_benchmark_worker`): a crash or hang while rendering one site costs
//! that one request, never the batch.

pub mod benchmark;
pub mod browser;
pub mod capture;
pub mod cli;
pub mod config;
pub mod highlight;
pub mod llm;
pub mod models;
pub mod outputs;
pub mod scrape;
pub mod utils;
pub mod worker;
