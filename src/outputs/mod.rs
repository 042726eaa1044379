//! Output generation modules for the annotated spreadsheet and run summary.
//!
//! # Submodules
//!
//! - [`report`]: Reads the candidate spreadsheet and writes the annotated CSV
//! - [`json`]: Writes a JSON summary of the whole run
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── benchmark_annotated_20250101_120000.csv
//! └── benchmark_20250101_120000.json
//!
//! evidence_dir/
//! ├── example_com_20250101_120000.png
//! └── json/
//!     └── 0_Acme Services.json
//! ```

pub mod json;
pub mod report;
