//! WoM hub reporting engine.
//!
//! A hub (tenant) periodically attests its reward-activity report and hands
//! it to the WoM/UEM network twice: once on chain through the UEM reporting
//! contract, once over HTTP to the WoM service that indexes it. This crate is
//! that submission engine:
//!
//! - [`wallet`] — hub key custody (encrypted keystore in the settings
//!   substrate) and `personal_sign`-style message signing,
//! - [`report`] — deterministic payload assembly and the signed, hash-stamped
//!   envelope,
//! - [`store`] — the persisted per-period status state machine with crash
//!   recovery and idempotent retries,
//! - [`chain`] — EIP-1559 transaction submission with gas estimation, bounded
//!   receipt polling and structured failure classification,
//! - [`wom`] — the WoM REST client (404 is absence, domain tokens are
//!   first-class errors),
//! - [`orchestrator`] — `send` / `refresh` / `list` wired together for the
//!   hosting application.
//!
//! The hosting application supplies the collaborators at the boundary:
//! reward metrics, hub identity (deed id + keystore passphrase) and a
//! settings key→value substrate. Everything network-facing is explicitly
//! constructed and injected; there are no globals.
//!
//! ```ignore
//! use std::sync::Arc;
//! use wom_hub::store::MemorySettingsStore;
//! use wom_hub::{HubConfig, ReportOrchestrator, TransactionSubmitter, WomClient};
//!
//! let config = HubConfig::new("https://polygon-rpc.com", uem_contract_address)
//!     .chain_id(137)
//!     .wom_url("https://wom.meeds.io");
//! let orchestrator = ReportOrchestrator::new(
//!     Arc::new(MemorySettingsStore::default()),
//!     rewards,  // RewardReportProvider supplied by the hosting application
//!     identity, // HubIdentityProvider supplied by the hosting application
//!     TransactionSubmitter::from_config(&config)?,
//!     WomClient::new(&config)?,
//! );
//! let view = orchestrator.send(period_id).await?;
//! assert!(view.can_refresh);
//! ```

pub mod address;
pub mod chain;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod types;
pub mod utils;
pub mod wallet;
pub mod wom;

pub use chain::TransactionSubmitter;
pub use config::HubConfig;
pub use error::{Error, Result};
pub use orchestrator::ReportOrchestrator;
pub use report::{build_report, ReportPayload, VerifiableEnvelope};
pub use store::{ReportLifecycleStore, SettingsStore};
pub use types::{LocalReportView, RemoteReport, ReportMetrics, ReportStatus, RewardPeriod};
pub use wallet::{HubWallet, WalletCustody};
pub use wom::WomClient;
