// ============================================================
// Layer 6 — Metrics
// ============================================================
// Two outputs:
//
//   MetricReporter — the single orchestrator-facing line
//
//       validation-accuracy: 0.981200
//
//     printed to stdout exactly once per training job. The
//     orchestrator greps it with
//       validation[-_ ]accuracy:\s*([0-9.]+)
//     which parse_metric_line implements (case-insensitive, so
//     "Validation accuracy: 0.9" still parses).
//
//   MetricsLogger — per-epoch / per-round history appended to
//     <output-data-dir>/metrics.csv
//
//       epoch,train_loss,val_loss,val_accuracy
//       1,0.412300,0.158100,0.953000
//       2,0.133900,0.101200,0.968400
//
//     For the tree trainer "epoch" is the boosting round and the
//     losses are multi-class log loss.
//
// Reference: regex crate documentation
//            Rust Book §12 (I/O and File Handling)

use anyhow::{bail, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::OnceLock,
};

pub const METRIC_NAME: &str = "validation-accuracy";

// ─── MetricReporter ───────────────────────────────────────────────────────────
pub struct MetricReporter<W: Write> {
    out:      W,
    reported: Option<f64>,
}

impl MetricReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> MetricReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, reported: None }
    }

    /// Emit the metric line. A second call, or an accuracy outside
    /// [0, 1], is an error and prints nothing.
    pub fn report(&mut self, accuracy: f64) -> Result<()> {
        if let Some(previous) = self.reported {
            bail!("metric already reported ({previous:.6}); refusing to emit a second line");
        }
        if !(0.0..=1.0).contains(&accuracy) {
            bail!("validation accuracy {accuracy} is outside [0, 1]");
        }

        writeln!(self.out, "{}", format_metric_line(accuracy))?;
        self.out.flush()?;
        self.reported = Some(accuracy);
        Ok(())
    }

    pub fn reported(&self) -> Option<f64> { self.reported }

    pub fn into_inner(self) -> W { self.out }
}

pub fn format_metric_line(accuracy: f64) -> String {
    format!("{METRIC_NAME}: {accuracy:.6}")
}

/// Extract the accuracy from one line of trainer output.
pub fn parse_metric_line(line: &str) -> Option<f64> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"(?i)validation[-_ ]accuracy:\s*([0-9.]+)").ok())
        .as_ref()?;
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

/// Last metric line found in a whole block of output.
pub fn find_metric(output: &str) -> Option<f64> {
    output.lines().filter_map(parse_metric_line).last()
}

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// One row of training history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Epoch or boosting round, starting at 1
    pub epoch: usize,

    pub train_loss: f64,

    pub val_loss: f64,

    /// Fraction of validation samples classified correctly, [0, 1]
    pub val_accuracy: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_accuracy: f64) -> Self {
        Self { epoch, train_loss, val_loss, val_accuracy }
    }

    /// True if this epoch beats `best` validation accuracy.
    pub fn is_improvement(&self, best: Option<f64>) -> bool {
        best.map_or(true, |b| self.val_accuracy > b)
    }
}

// ─── HistorySink ──────────────────────────────────────────────────────────────
/// Receives one row of training history per epoch.
pub trait HistorySink {
    fn record(&self, row: &EpochMetrics) -> Result<()>;
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh `metrics.csv` in `dir`; rows of an earlier run are discarded.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        let mut f = fs::File::create(&csv_path)?;
        writeln!(f, "epoch,train_loss,val_loss,val_accuracy")?;
        tracing::debug!("Started metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.val_accuracy,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl HistorySink for MetricsLogger {
    fn record(&self, row: &EpochMetrics) -> Result<()> {
        self.log(row)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reports_exactly_once() {
        let mut reporter = MetricReporter::new(Vec::new());
        reporter.report(0.75).unwrap();
        assert!(reporter.report(0.8).is_err());

        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, "validation-accuracy: 0.750000\n");
    }

    #[test]
    fn test_out_of_range_accuracy_rejected() {
        let mut reporter = MetricReporter::new(Vec::new());
        assert!(reporter.report(1.5).is_err());
        assert!(reporter.report(f64::NAN).is_err());
        assert_eq!(reporter.reported(), None);
    }

    #[test]
    fn test_parse_both_spellings() {
        assert_eq!(parse_metric_line("validation-accuracy: 0.981200"), Some(0.9812));
        assert_eq!(parse_metric_line("Validation accuracy: 0.5"), Some(0.5));
        assert_eq!(parse_metric_line("validation_accuracy:1"), Some(1.0));
        assert_eq!(parse_metric_line("[3]\tvalidation-mlogloss:0.2"), None);
    }

    #[test]
    fn test_find_metric_in_output() {
        let out = "Epoch   1/1 | train_loss=2.3\nvalidation-accuracy: 0.100000\n";
        assert_eq!(find_metric(out), Some(0.1));
    }

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 0.5, 0.4, 0.8);
        assert!(m.is_improvement(None));
        assert!(m.is_improvement(Some(0.7)));
        assert!(!m.is_improvement(Some(0.8)));
    }

    #[test]
    fn test_csv_rows_appended() {
        let dir    = TempDir::new().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log(&EpochMetrics::new(1, 2.0, 1.5, 0.25)).unwrap();
        logger.log(&EpochMetrics::new(2, 1.0, 0.9, 0.5)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss,val_accuracy");
        assert_eq!(lines[2], "2,1.000000,0.900000,0.500000");
    }

    #[test]
    fn test_restart_discards_previous_history() {
        let dir = TempDir::new().unwrap();
        MetricsLogger::new(dir.path()).unwrap().log(&EpochMetrics::new(1, 2.0, 1.5, 0.25)).unwrap();

        let retry = MetricsLogger::new(dir.path()).unwrap();
        retry.log(&EpochMetrics::new(1, 1.0, 0.9, 0.5)).unwrap();

        let csv = fs::read_to_string(retry.csv_path()).unwrap();
        assert_eq!(csv, "epoch,train_loss,val_loss,val_accuracy\n1,1.000000,0.900000,0.500000\n");
    }
}
