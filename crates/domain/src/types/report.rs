//! Queries over the fault history and aggregated reports.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fault::{FaultRecord, FaultSeverity, FaultSource};
use crate::constants::REPORT_TOP_MESSAGES;

/// Filter for `list`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultQuery {
    pub severity: Option<FaultSeverity>,
    pub source: Option<FaultSource>,
    /// Only records at or after this instant
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl FaultQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severity(mut self, severity: FaultSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn source(mut self, source: FaultSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `record` passes the severity, source and time filters
    pub fn matches(&self, record: &FaultRecord) -> bool {
        self.severity.map_or(true, |s| record.severity == s)
            && self.source.map_or(true, |s| record.source == s)
            && self.since.map_or(true, |since| record.timestamp >= since)
    }
}

/// Inclusive time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// How often one message occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCount {
    pub message: String,
    pub count: usize,
}

/// Aggregated counts over the fault history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultReport {
    pub total: usize,
    pub by_severity: BTreeMap<FaultSeverity, usize>,
    pub by_source: BTreeMap<FaultSource, usize>,
    /// Most frequent messages, most frequent first
    pub top_messages: Vec<MessageCount>,
    /// Requested window, if any
    pub range: Option<TimeRange>,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl FaultReport {
    /// Aggregate `records` that fall inside `range` (all records when `None`)
    pub fn build<'a, I>(records: I, range: Option<TimeRange>) -> Self
    where
        I: IntoIterator<Item = &'a FaultRecord>,
    {
        let mut report = Self { range, ..Self::default() };
        let mut messages: HashMap<&str, usize> = HashMap::new();

        for record in records {
            if range.is_some_and(|r| !r.contains(record.timestamp)) {
                continue;
            }
            report.total += 1;
            *report.by_severity.entry(record.severity).or_default() += 1;
            *report.by_source.entry(record.source).or_default() += 1;
            *messages.entry(record.message()).or_default() += 1;
            report.earliest =
                Some(report.earliest.map_or(record.timestamp, |e| e.min(record.timestamp)));
            report.latest = Some(report.latest.map_or(record.timestamp, |l| l.max(record.timestamp)));
        }

        let mut ranked: Vec<MessageCount> = messages
            .into_iter()
            .map(|(message, count)| MessageCount { message: message.to_string(), count })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        ranked.truncate(REPORT_TOP_MESSAGES);
        report.top_messages = ranked;
        report
    }

    pub fn count_severity(&self, severity: FaultSeverity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn count_source(&self, source: FaultSource) -> usize {
        self.by_source.get(&source).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::types::fault::{FaultContext, FaultError};

    fn record(
        minutes: i64,
        severity: FaultSeverity,
        source: FaultSource,
        message: &str,
    ) -> FaultRecord {
        FaultRecord {
            id: Uuid::new_v4(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minutes),
            error: FaultError::new(message),
            severity,
            source,
            handled: false,
            session_id: Uuid::nil(),
            context: FaultContext::new(),
            system_snapshot: None,
        }
    }

    /// Validates the query filters combine with AND semantics.
    ///
    /// Assertions:
    /// - Only records matching severity, source and since pass.
    #[test]
    fn test_query_matches_all_filters() {
        let query = FaultQuery::new()
            .severity(FaultSeverity::High)
            .source(FaultSource::Extension)
            .since(DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(5));

        assert!(query.matches(&record(5, FaultSeverity::High, FaultSource::Extension, "x")));
        assert!(!query.matches(&record(4, FaultSeverity::High, FaultSource::Extension, "x")));
        assert!(!query.matches(&record(6, FaultSeverity::Low, FaultSource::Extension, "x")));
        assert!(!query.matches(&record(6, FaultSeverity::High, FaultSource::UiSurface, "x")));
        assert!(FaultQuery::new().matches(&record(0, FaultSeverity::Low, FaultSource::Unknown, "x")));
    }

    /// Validates report aggregation inside a range.
    ///
    /// Assertions:
    /// - Records outside the range are excluded.
    /// - Counts per severity and source are correct.
    /// - Top messages rank by count and the time bounds are tracked.
    #[test]
    fn test_report_aggregates_in_range() {
        let records = vec![
            record(1, FaultSeverity::Low, FaultSource::DependentService, "ECONNREFUSED"),
            record(2, FaultSeverity::High, FaultSource::DependentService, "ECONNREFUSED"),
            record(3, FaultSeverity::Critical, FaultSource::CoreProcess, "SQLITE_CORRUPT"),
            record(90, FaultSeverity::Low, FaultSource::Extension, "late"),
        ];
        let range = TimeRange::new(
            DateTime::<Utc>::UNIX_EPOCH,
            DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(60),
        );

        let report = FaultReport::build(&records, Some(range));

        assert_eq!(report.total, 3);
        assert_eq!(report.count_severity(FaultSeverity::Low), 1);
        assert_eq!(report.count_severity(FaultSeverity::Medium), 0);
        assert_eq!(report.count_source(FaultSource::DependentService), 2);
        assert_eq!(report.top_messages[0], MessageCount { message: "ECONNREFUSED".into(), count: 2 });
        assert_eq!(report.earliest, Some(records[0].timestamp));
        assert_eq!(report.latest, Some(records[2].timestamp));
    }

    #[test]
    fn test_top_messages_capped() {
        let records: Vec<_> = (0..8)
            .map(|i| record(i, FaultSeverity::Low, FaultSource::Unknown, &format!("m{i}")))
            .collect();
        let report = FaultReport::build(&records, None);
        assert_eq!(report.top_messages.len(), REPORT_TOP_MESSAGES);
    }

    #[test]
    fn test_report_serializes_enum_keys() {
        let records = vec![record(0, FaultSeverity::High, FaultSource::UiSurface, "gone")];
        let json = serde_json::to_value(FaultReport::build(&records, None)).expect("serialize");
        assert_eq!(json["by_severity"]["high"], 1);
        assert_eq!(json["by_source"]["ui-surface"], 1);
    }
}
