use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Work done for a record that completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub photos_downloaded: usize,
    pub photos_copied: usize,
    /// Photos whose archive name was already taken and kept.
    pub photos_already_archived: usize,
    pub photos_recorded: usize,
    pub report_copied: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Not eligible for archiving (e.g. not yet `Complete`).
    Skipped { reason: String },
    /// Every photo was already in the ledger.
    Unchanged,
    Completed(RecordStats),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordResult {
    pub record_id: String,
    pub project_number: String,
    pub branch: Option<String>,
    pub outcome: RecordOutcome,
}

/// Result of one pass over the form's records.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Shutdown was requested before every record was processed.
    pub interrupted: bool,
    pub records: Vec<RecordResult>,
}

impl PassSummary {
    fn count(&self, pred: impl Fn(&RecordOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Completed(_)))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RecordOutcome::Failed { .. }))
    }

    pub fn photos_copied(&self) -> usize {
        self.records
            .iter()
            .map(|r| match &r.outcome {
                RecordOutcome::Completed(stats) => stats.photos_copied,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&RecordResult, &str)> {
        self.records.iter().filter_map(|r| match &r.outcome {
            RecordOutcome::Failed { reason } => Some((r, reason.as_str())),
            _ => None,
        })
    }

    pub fn log(&self) {
        let elapsed = (self.finished_at - self.started_at).num_seconds();
        tracing::info!(
            pass_id = %self.pass_id,
            records = self.records.len(),
            completed = self.completed(),
            unchanged = self.unchanged(),
            skipped = self.skipped(),
            failed = self.failed(),
            photos_copied = self.photos_copied(),
            interrupted = self.interrupted,
            elapsed_secs = elapsed,
            "Pass finished"
        );
        for (record, reason) in self.failures() {
            tracing::warn!(
                record_id = %record.record_id,
                project_number = %record.project_number,
                branch = record.branch.as_deref().unwrap_or(""),
                reason,
                "Record failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, outcome: RecordOutcome) -> RecordResult {
        RecordResult {
            record_id: id.to_string(),
            project_number: "1".to_string(),
            branch: None,
            outcome,
        }
    }

    #[test]
    fn test_counts() {
        let now = Utc::now();
        let summary = PassSummary {
            pass_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            interrupted: false,
            records: vec![
                result(
                    "a",
                    RecordOutcome::Completed(RecordStats {
                        photos_copied: 3,
                        ..RecordStats::default()
                    }),
                ),
                result(
                    "b",
                    RecordOutcome::Completed(RecordStats {
                        photos_copied: 2,
                        ..RecordStats::default()
                    }),
                ),
                result("c", RecordOutcome::Unchanged),
                result(
                    "d",
                    RecordOutcome::Skipped {
                        reason: "status is 'Draft'".into(),
                    },
                ),
                result(
                    "e",
                    RecordOutcome::Failed {
                        reason: "boom".into(),
                    },
                ),
            ],
        };
        assert_eq!(summary.completed(), 2);
        assert_eq!(summary.unchanged(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.photos_copied(), 5);
        let failures: Vec<_> = summary
            .failures()
            .map(|(r, reason)| (r.record_id.as_str(), reason))
            .collect();
        assert_eq!(failures, vec![("e", "boom")]);
    }
}
