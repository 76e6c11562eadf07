//! Telemetry sink that forwards fault records into the log stream

use async_trait::async_trait;
use faultline_core::TelemetrySink;
use faultline_domain::{FaultRecord, Result};

/// Tracing target used for telemetry events, so they can be routed or
/// filtered independently (`faultline::telemetry=info`)
pub const TELEMETRY_TARGET: &str = "faultline::telemetry";

/// Emits each record as one structured `info` event carrying the full JSON
/// payload. Useful when an external aggregator tails the JSON log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTelemetrySink;

#[async_trait]
impl TelemetrySink for LogTelemetrySink {
    async fn send(&self, record: FaultRecord) -> Result<()> {
        let payload = serde_json::to_string(&record)?;
        tracing::info!(
            target: TELEMETRY_TARGET,
            fault_id = %record.id,
            session_id = %record.session_id,
            severity = %record.severity,
            source = %record.source,
            payload = %payload,
            "fault_telemetry"
        );
        Ok(())
    }
}
