//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets can be provided via flags or environment variables; everything
//! else is explicit.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the benchmark application.
///
/// # Examples
///
/// ```sh
/// # Full benchmark over a candidate sheet
/// tp_benchmark run -i companies.csv -d "Administrative support services" --api-key KEY
///
/// # Standalone evidence capture with a highlighted phrase
/// tp_benchmark capture --url https://example.com --highlight "a global team"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full benchmark over a candidate spreadsheet
    Run(RunArgs),
    /// Capture banner-stamped (optionally highlighted) screenshots
    Capture(CaptureArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input CSV of candidate companies (columns: company, website)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Client activity description the LLM compares each company against
    #[arg(short = 'd', long)]
    pub client_description: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Optional path to a config.yaml overriding the tuning defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory for the annotated report and run summary
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for evidence screenshots and scrape blobs
    #[arg(short, long)]
    pub evidence_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Page to capture; repeat the flag for several pages
    #[arg(long, required = true)]
    pub url: Vec<String>,

    /// Phrase to locate and highlight on every captured page
    #[arg(long)]
    pub highlight: Option<String>,

    /// Optional path to a config.yaml overriding the tuning defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the captured screenshots
    #[arg(short, long)]
    pub evidence_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parsing() {
        let cli = Cli::parse_from([
            "tp_benchmark",
            "run",
            "--input",
            "companies.csv",
            "--client-description",
            "Administrative support services",
            "--api-key",
            "k",
        ]);

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.input, PathBuf::from("companies.csv"));
                assert_eq!(args.client_description, "Administrative support services");
                assert!(args.config.is_none());
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_capture_parsing_with_repeated_urls() {
        let cli = Cli::parse_from([
            "tp_benchmark",
            "capture",
            "--url",
            "https://a.example",
            "--url",
            "https://b.example",
            "--highlight",
            "a global team",
        ]);

        match cli.command {
            Command::Capture(args) => {
                assert_eq!(args.url.len(), 2);
                assert_eq!(args.highlight.as_deref(), Some("a global team"));
            }
            _ => panic!("expected capture subcommand"),
        }
    }

    #[test]
    fn test_capture_requires_url() {
        let result = Cli::try_parse_from(["tp_benchmark", "capture"]);
        assert!(result.is_err());
    }
}
