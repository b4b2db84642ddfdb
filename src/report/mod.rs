//! Report assembly: immutable payloads and their signed envelopes.

pub mod envelope;
pub mod payload;

pub use envelope::VerifiableEnvelope;
pub use payload::{build_report, ReportPayload, REPORT_SCHEMA_VERSION};
