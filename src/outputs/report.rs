//! Candidate spreadsheet input and annotated report output.
//!
//! The input sheet is a CSV with a `company` and a `website` column (extra
//! columns are ignored). The output report carries every input row plus the
//! annotation columns, one row per company, in input order; rejected rows
//! are part of the deliverable, not an error path.

use crate::models::{CompanyRow, RowOutcome};
use chrono::Local;
use csv::{Reader, Writer};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Read the candidate companies from a CSV file.
///
/// Rows with an empty or `"0"` website are *kept*: the benchmark loop
/// rejects them with an explicit reason rather than dropping them silently,
/// so the output row count always matches the input.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_companies(path: &Path) -> Result<Vec<CompanyRow>, Box<dyn Error>> {
    let mut reader = Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize::<CompanyRow>() {
        rows.push(record?);
    }
    info!(count = rows.len(), "Loaded candidate companies");
    Ok(rows)
}

/// Write the annotated report CSV and return its path.
///
/// The filename embeds a timestamp so repeated runs never clobber each other.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub fn write_report(
    outcomes: &[RowOutcome],
    output_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("benchmark_annotated_{timestamp}.csv"));

    let mut writer = Writer::from_path(&path)?;
    writer.write_record([
        "Company",
        "Website",
        "Missing information",
        "Different functions",
        "Different service",
        "Group",
        "A/R",
        "Comment",
        "Evidence link",
        "Confidence",
    ])?;

    for outcome in outcomes {
        let confidence = outcome.confidence.to_string();
        writer.write_record([
            outcome.company.as_str(),
            outcome.website.as_str(),
            outcome.missing_information.as_str(),
            outcome.different_functions.as_str(),
            outcome.different_service.as_str(),
            outcome.group.as_str(),
            outcome.decision.code(),
            outcome.comment.as_str(),
            outcome.evidence_link.as_str(),
            confidence.as_str(),
        ])?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = outcomes.len(), "Wrote annotated report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Decision;

    fn outcome(company: &str, decision: Decision) -> RowOutcome {
        RowOutcome {
            company: company.to_string(),
            website: "https://example.com".to_string(),
            decision,
            missing_information: "NO".to_string(),
            different_functions: "NO".to_string(),
            different_service: "NO".to_string(),
            group: "NO".to_string(),
            comment: "Looks comparable (confidence: 80%)".to_string(),
            evidence_link: "=HYPERLINK(\"/tmp/e.png\", \"View evidence\")".to_string(),
            confidence: 80,
        }
    }

    #[test]
    fn test_read_companies_ignores_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("companies.csv");
        std::fs::write(
            &input,
            "company,website,country\nAcme,https://acme.example,ES\nBeta,0,ES\n",
        )
        .unwrap();

        let rows = read_companies(&input).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].company, "Acme");
        assert_eq!(rows[1].website, "0");
    }

    #[test]
    fn test_write_report_shape() {
        let dir = tempfile::tempdir().unwrap();
        let outcomes = vec![
            outcome("Acme", Decision::Accept),
            outcome("Beta", Decision::Reject),
        ];

        let path = write_report(&outcomes, dir.path()).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();

        let mut lines = raw.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Company,Website,"));
        assert!(header.contains("A/R"));
        assert!(header.ends_with("Confidence"));

        let first = lines.next().unwrap();
        assert!(first.starts_with("Acme,"));
        assert!(first.contains(",A,"));
        let second = lines.next().unwrap();
        assert!(second.contains(",R,"));
    }
}
