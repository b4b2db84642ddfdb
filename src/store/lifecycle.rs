//! Per-period report lifecycle: persisted status state machine, id indices
//! and crash recovery.
//!
//! Storage layout (all under the `WoM` context, keyed by the stringified
//! period or report id):
//! - `RewardReportStatus/{periodId}`  → status name, or the raw error payload
//!   of the last failed attempt (anything unknown parses as `ERROR_SENDING`),
//! - `RewardReportSentDate/{periodId}` → epoch milliseconds,
//! - `RewardReportId/{periodId}`       → remote report id,
//! - `RewardPeriodId/{reportId}`       → reverse index.
//!
//! Allowed transitions:
//! ```text
//! NONE ─────────────→ SENDING ──→ SENT ──→ PENDING_REWARD ──→ REWARDED
//! ERROR_SENDING ────↗    │                      │         └──→ REJECTED
//! INVALID (no id) ──↗    └──→ ERROR_SENDING     └────────────→ REJECTED
//! ```
//! External notification statuses (`SENT` and beyond) are accepted
//! idempotently (same-state transitions allowed). Everything else is an
//! `IllegalStateTransition` — a defect in the caller, never swallowed.
//!
//! A record found still in `SENDING` when a new attempt begins is the residue
//! of a crashed submission; `begin_sending` forces it to `ERROR_SENDING`
//! before proceeding so a crash can never block a period forever.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::store::SettingsStore;
use crate::types::ReportStatus;

const WOM_CONTEXT: &str = "WoM";
const SCOPE_STATUS: &str = "RewardReportStatus";
const SCOPE_SENT_DATE: &str = "RewardReportSentDate";
const SCOPE_REPORT_ID: &str = "RewardReportId";
const SCOPE_PERIOD_ID: &str = "RewardPeriodId";

/// Error payload recorded when a stale `SENDING` record is repaired.
pub const STUCK_SENDING_ERROR: &str = "wom.stuckSending";

/// Everything persisted for one reporting period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodStatusRecord {
    pub status: ReportStatus,
    /// Error payload of the last failed attempt, when `status` is
    /// `ErrorSending`.
    pub error: Option<String>,
    /// Remote report id; 0 = unset.
    pub report_id: u64,
    /// Submission instant, epoch milliseconds.
    pub sent_at: Option<u64>,
}

impl PeriodStatusRecord {
    fn empty() -> Self {
        Self { status: ReportStatus::None, error: None, report_id: 0, sent_at: None }
    }
}

/// Persisted period → status map with state-machine enforcement.
pub struct ReportLifecycleStore<S> {
    store: Arc<S>,
    // Linearizes all read-modify-write sequences; period records are tiny and
    // writes are rare (one per send attempt), so a single lock suffices.
    guard: Mutex<()>,
}

impl<S: SettingsStore> ReportLifecycleStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store, guard: Mutex::new(()) }
    }

    /// Current record for a period; a never-seen period is `NONE`.
    pub fn status(&self, period_id: u64) -> PeriodStatusRecord {
        let _g = self.lock();
        self.read_record(period_id)
    }

    /// Enter the `SENDING` state for a new submission attempt.
    ///
    /// Applies crash recovery first: a record already in `SENDING` is forced
    /// to `ERROR_SENDING` (payload [`STUCK_SENDING_ERROR`]) and the attempt
    /// proceeds. From any state that does not permit sending, fails with
    /// `IllegalStateTransition`.
    pub fn begin_sending(&self, period_id: u64) -> Result<()> {
        let _g = self.lock();
        let mut record = self.read_record(period_id);
        if record.status == ReportStatus::Sending {
            self.write_status(period_id, STUCK_SENDING_ERROR);
            record.status = ReportStatus::ErrorSending;
        }
        if !record.status.can_send(record.report_id != 0) {
            return Err(Error::IllegalStateTransition {
                from: record.status,
                to: ReportStatus::Sending,
            });
        }
        self.write_status(period_id, ReportStatus::Sending.as_str());
        Ok(())
    }

    /// `SENDING` → `SENT`, recording the remote report id and submission
    /// instant, and maintaining both id indices.
    pub fn mark_sent(&self, period_id: u64, report_id: u64, sent_at_millis: u64) -> Result<()> {
        let _g = self.lock();
        let record = self.read_record(period_id);
        if record.status != ReportStatus::Sending {
            return Err(Error::IllegalStateTransition {
                from: record.status,
                to: ReportStatus::Sent,
            });
        }
        self.store.set(WOM_CONTEXT, SCOPE_REPORT_ID, &period_id.to_string(), &report_id.to_string());
        self.store.set(WOM_CONTEXT, SCOPE_PERIOD_ID, &report_id.to_string(), &period_id.to_string());
        self.store.set(
            WOM_CONTEXT,
            SCOPE_SENT_DATE,
            &period_id.to_string(),
            &sent_at_millis.to_string(),
        );
        self.write_status(period_id, ReportStatus::Sent.as_str());
        Ok(())
    }

    /// `SENDING` → `ERROR_SENDING`, storing `error` as the status payload so
    /// later `list`/`refresh` calls can surface it.
    pub fn mark_error(&self, period_id: u64, error: &str) -> Result<()> {
        let _g = self.lock();
        let record = self.read_record(period_id);
        if record.status != ReportStatus::Sending {
            return Err(Error::IllegalStateTransition {
                from: record.status,
                to: ReportStatus::ErrorSending,
            });
        }
        let payload = if error.is_empty() { "wom.unknownError" } else { error };
        self.write_status(period_id, payload);
        Ok(())
    }

    /// Apply an externally notified status (`PENDING_REWARD` / `REWARDED` /
    /// `REJECTED`), idempotently.
    pub fn apply_remote_status(&self, period_id: u64, status: ReportStatus) -> Result<()> {
        let _g = self.lock();
        let record = self.read_record(period_id);
        if record.status == status {
            return Ok(()); // idempotent redelivery
        }
        let allowed = matches!(
            (record.status, status),
            (ReportStatus::Sent, ReportStatus::PendingReward)
                | (ReportStatus::Sent, ReportStatus::Rewarded)
                | (ReportStatus::Sent, ReportStatus::Rejected)
                | (ReportStatus::PendingReward, ReportStatus::Rewarded)
                | (ReportStatus::PendingReward, ReportStatus::Rejected)
        );
        if !allowed {
            return Err(Error::IllegalStateTransition { from: record.status, to: status });
        }
        self.write_status(period_id, status.as_str());
        Ok(())
    }

    /// Mark a period as invalid (e.g. it predates the hub's network join).
    /// Only an untouched period may become invalid.
    pub fn mark_invalid(&self, period_id: u64) -> Result<()> {
        let _g = self.lock();
        let record = self.read_record(period_id);
        if record.status == ReportStatus::Invalid {
            return Ok(());
        }
        if record.status != ReportStatus::None {
            return Err(Error::IllegalStateTransition {
                from: record.status,
                to: ReportStatus::Invalid,
            });
        }
        self.write_status(period_id, ReportStatus::Invalid.as_str());
        Ok(())
    }

    /// Remote report id for a period; 0 when never sent.
    pub fn report_id(&self, period_id: u64) -> u64 {
        self.store
            .get(WOM_CONTEXT, SCOPE_REPORT_ID, &period_id.to_string())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Reverse index: period owning a remote report id; 0 when unknown.
    pub fn period_id_for_report(&self, report_id: u64) -> u64 {
        self.store
            .get(WOM_CONTEXT, SCOPE_PERIOD_ID, &report_id.to_string())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Recorded submission instant, epoch milliseconds.
    pub fn sent_date(&self, period_id: u64) -> Option<u64> {
        self.store
            .get(WOM_CONTEXT, SCOPE_SENT_DATE, &period_id.to_string())
            .and_then(|v| v.parse().ok())
    }

    /// Submission instant for payload building: the recorded one, or "now"
    /// for a first attempt.
    pub fn sent_date_or_now(&self, period_id: u64) -> u64 {
        self.sent_date(period_id)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as u64)
    }

    // --------------------------- internals ----------------------------------

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned guard only means a panicking reader; the map itself is
        // still consistent because every write is a single `set`.
        self.guard.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_record(&self, period_id: u64) -> PeriodStatusRecord {
        let stored = self.store.get(WOM_CONTEXT, SCOPE_STATUS, &period_id.to_string());
        let (status, error) = parse_stored_status(stored.as_deref());
        PeriodStatusRecord {
            status,
            error,
            report_id: self.report_id(period_id),
            sent_at: self.sent_date(period_id),
        }
    }

    fn write_status(&self, period_id: u64, value: &str) {
        self.store.set(WOM_CONTEXT, SCOPE_STATUS, &period_id.to_string(), value);
    }
}

/// Decode the status slot: a known status name maps directly; blank means the
/// period was never touched; anything else is the error payload of a failed
/// attempt.
fn parse_stored_status(stored: Option<&str>) -> (ReportStatus, Option<String>) {
    match stored.map(str::trim) {
        None | Some("") => (ReportStatus::None, None),
        Some("NONE") => (ReportStatus::None, None),
        Some("SENDING") => (ReportStatus::Sending, None),
        Some("SENT") => (ReportStatus::Sent, None),
        Some("PENDING_REWARD") => (ReportStatus::PendingReward, None),
        Some("REWARDED") => (ReportStatus::Rewarded, None),
        Some("REJECTED") => (ReportStatus::Rejected, None),
        Some("INVALID") => (ReportStatus::Invalid, None),
        Some(other) => (ReportStatus::ErrorSending, Some(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySettingsStore;

    fn store() -> ReportLifecycleStore<MemorySettingsStore> {
        ReportLifecycleStore::new(Arc::new(MemorySettingsStore::default()))
    }

    #[test]
    fn fresh_period_is_none() {
        let s = store();
        let r = s.status(99);
        assert_eq!(r.status, ReportStatus::None);
        assert_eq!(r.report_id, 0);
        assert!(r.sent_at.is_none());
    }

    #[test]
    fn happy_path_none_sending_sent() {
        let s = store();
        s.begin_sending(1).unwrap();
        assert_eq!(s.status(1).status, ReportStatus::Sending);
        s.mark_sent(1, 42, 1_700_000_000_000).unwrap();
        let r = s.status(1);
        assert_eq!(r.status, ReportStatus::Sent);
        assert_eq!(r.report_id, 42);
        assert_eq!(r.sent_at, Some(1_700_000_000_000));
        assert_eq!(s.period_id_for_report(42), 1);
    }

    #[test]
    fn failure_records_error_payload() {
        let s = store();
        s.begin_sending(1).unwrap();
        s.mark_error(1, "uem.notAuthorized").unwrap();
        let r = s.status(1);
        assert_eq!(r.status, ReportStatus::ErrorSending);
        assert_eq!(r.error.as_deref(), Some("uem.notAuthorized"));
        // and a retry is permitted
        s.begin_sending(1).unwrap();
    }

    #[test]
    fn sent_period_cannot_resend() {
        let s = store();
        s.begin_sending(1).unwrap();
        s.mark_sent(1, 7, 1).unwrap();
        let err = s.begin_sending(1).unwrap_err();
        assert!(matches!(
            err,
            Error::IllegalStateTransition { from: ReportStatus::Sent, to: ReportStatus::Sending }
        ));
    }

    #[test]
    fn stuck_sending_is_repaired_on_next_attempt() {
        // A record left in SENDING (crashed mid-flight submission) must not
        // block the period: the next attempt repairs it and proceeds.
        let inner = MemorySettingsStore::default();
        inner.set("WoM", "RewardReportStatus", "2", "SENDING");
        let s = ReportLifecycleStore::new(Arc::new(inner));

        s.begin_sending(2).unwrap();
        assert_eq!(s.status(2).status, ReportStatus::Sending);
        // and the repaired attempt can still terminate normally
        s.mark_error(2, STUCK_SENDING_ERROR).unwrap();
        assert_eq!(s.status(2).error.as_deref(), Some(STUCK_SENDING_ERROR));
    }

    #[test]
    fn mark_sent_requires_sending() {
        let s = store();
        let err = s.mark_sent(1, 7, 1).unwrap_err();
        assert!(matches!(err, Error::IllegalStateTransition { .. }));
    }

    #[test]
    fn mark_error_requires_sending() {
        let s = store();
        let err = s.mark_error(1, "wom.unknownError").unwrap_err();
        assert!(matches!(err, Error::IllegalStateTransition { .. }));
    }

    #[test]
    fn remote_statuses_apply_idempotently() {
        let s = store();
        s.begin_sending(1).unwrap();
        s.mark_sent(1, 7, 1).unwrap();
        s.apply_remote_status(1, ReportStatus::PendingReward).unwrap();
        s.apply_remote_status(1, ReportStatus::PendingReward).unwrap(); // redelivery
        s.apply_remote_status(1, ReportStatus::Rewarded).unwrap();
        // rewarded is terminal
        assert!(s.apply_remote_status(1, ReportStatus::Rejected).is_err());
    }

    #[test]
    fn remote_status_from_none_is_rejected() {
        let s = store();
        assert!(s.apply_remote_status(5, ReportStatus::Rewarded).is_err());
    }

    #[test]
    fn invalid_period_without_report_id_can_send() {
        let s = store();
        s.mark_invalid(3).unwrap();
        assert_eq!(s.status(3).status, ReportStatus::Invalid);
        s.begin_sending(3).unwrap();
    }

    #[test]
    fn unknown_stored_value_parses_as_error_sending() {
        let (status, error) = parse_stored_status(Some("{\"message\":\"wom.alreadySent\"}"));
        assert_eq!(status, ReportStatus::ErrorSending);
        assert!(error.unwrap().contains("wom.alreadySent"));
        assert_eq!(parse_stored_status(None).0, ReportStatus::None);
        assert_eq!(parse_stored_status(Some("  ")).0, ReportStatus::None);
    }
}
