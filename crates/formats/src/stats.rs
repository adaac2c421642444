//! Statistics export
//!
//! Serializes run statistics to JSON with string keys and stable
//! ordering so reports diff cleanly between runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::Result;
use rapidsift_filters::CurationStats;

/// JSON statistics report for one curation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsReport {
    pub total_processed: usize,
    pub kept: usize,
    pub rejected: usize,
    pub sanitized: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rejection_counts: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub removed_pii: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contamination_by_dataset: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub language_counts: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter_timings_ms: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_filters: Vec<String>,
}

impl From<&CurationStats> for StatsReport {
    fn from(stats: &CurationStats) -> Self {
        Self {
            total_processed: stats.total_processed,
            kept: stats.kept,
            rejected: stats.rejected,
            sanitized: stats.sanitized,
            rejection_counts: stats
                .rejection_counts
                .iter()
                .map(|(reason, count)| (reason.as_str().to_string(), *count))
                .collect(),
            removed_pii: stats
                .removed_pii
                .iter()
                .map(|(pii, count)| (pii.as_str().to_string(), *count))
                .collect(),
            contamination_by_dataset: BTreeMap::new(),
            language_counts: BTreeMap::new(),
            filter_timings_ms: stats
                .filter_timings_ms
                .iter()
                .map(|(name, ms)| (name.clone(), *ms))
                .collect(),
            degraded_filters: stats.degraded_filters.clone(),
        }
    }
}

impl StatsReport {
    pub fn with_contamination(
        mut self,
        by_dataset: impl IntoIterator<Item = (String, usize)>,
    ) -> Self {
        self.contamination_by_dataset = by_dataset.into_iter().collect();
        self
    }

    pub fn with_languages(
        mut self,
        counts: impl IntoIterator<Item = (String, usize)>,
    ) -> Self {
        self.language_counts = counts.into_iter().collect();
        self
    }

    /// Write the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        info!("Wrote statistics to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapidsift_filters::{PiiType, RejectReason};

    fn sample_stats() -> CurationStats {
        let mut stats = CurationStats {
            total_processed: 10,
            kept: 6,
            rejected: 3,
            sanitized: 1,
            ..Default::default()
        };
        stats.rejection_counts.insert(RejectReason::TooShort, 2);
        stats.rejection_counts.insert(RejectReason::Gibberish, 1);
        stats.removed_pii.insert(PiiType::Email, 4);
        stats.filter_timings_ms.insert("length".to_string(), 1.5);
        stats
    }

    #[test]
    fn test_report_from_stats() {
        let report = StatsReport::from(&sample_stats());
        assert_eq!(report.total_processed, 10);
        assert_eq!(report.kept + report.rejected + report.sanitized, 10);
        assert_eq!(report.rejection_counts["too_short"], 2);
        assert_eq!(report.removed_pii["email"], 4);
    }

    #[test]
    fn test_json_round_trip() {
        let report = StatsReport::from(&sample_stats())
            .with_contamination([("squad".to_string(), 3)])
            .with_languages([("eng".to_string(), 9)]);

        let json = serde_json::to_string_pretty(&report).unwrap();
        let back: StatsReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.contamination_by_dataset["squad"], 3);
        assert_eq!(back.language_counts["eng"], 9);
        assert_eq!(back.rejection_counts["gibberish"], 1);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        StatsReport::from(&sample_stats()).write(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"total_processed\": 10"));
    }
}
