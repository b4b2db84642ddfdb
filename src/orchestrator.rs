//! Report orchestration: the `send` / `refresh` / `list` operations exposed
//! to the hosting application.
//!
//! `send` is the only mutating pipeline:
//!
//! ```text
//! metrics → build payload → sign → seal envelope
//!   → [per-period lock] NONE→SENDING → chain submit → WoM persist → SENT
//! ```
//!
//! Every failure after entering `SENDING` is recorded as `ERROR_SENDING`
//! (with the most specific domain token available) before propagating, so a
//! later `list`/`refresh` can reconstruct what went wrong. Sends for the same
//! period are serialized by a per-period async mutex; unrelated periods run
//! concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::address;
use crate::error::{Error, Result};
use crate::report::envelope::VerifiableEnvelope;
use crate::report::payload::{build_report, ReportPayload};
use crate::store::lifecycle::ReportLifecycleStore;
use crate::store::SettingsStore;
use crate::types::{
    Address, LocalReportView, RemoteReport, ReportMetrics, ReportStatus, RewardPeriod,
};
use crate::wallet::{HubWallet, WalletCustody};

/// Chain-submission seam; implemented by
/// [`crate::chain::TransactionSubmitter`] and by fakes in tests.
#[async_trait]
pub trait ReportChain: Send + Sync {
    /// Submit one report transaction; returns the network-assigned report id.
    async fn submit_report(&self, payload: &ReportPayload, wallet: &HubWallet) -> Result<u64>;
}

#[async_trait]
impl ReportChain for crate::chain::TransactionSubmitter {
    async fn submit_report(&self, payload: &ReportPayload, wallet: &HubWallet) -> Result<u64> {
        self.submit(payload, wallet).await
    }
}

#[async_trait]
impl<T: ReportChain + ?Sized> ReportChain for Arc<T> {
    async fn submit_report(&self, payload: &ReportPayload, wallet: &HubWallet) -> Result<u64> {
        (**self).submit_report(payload, wallet).await
    }
}

/// Remote-persistence seam; implemented by [`crate::wom::WomClient`].
#[async_trait]
pub trait ReportGateway: Send + Sync {
    async fn persist(&self, envelope: &VerifiableEnvelope) -> Result<RemoteReport>;
    async fn fetch(&self, report_id: u64) -> Result<Option<RemoteReport>>;
}

#[async_trait]
impl ReportGateway for crate::wom::WomClient {
    async fn persist(&self, envelope: &VerifiableEnvelope) -> Result<RemoteReport> {
        // Fully qualified: the inherent method, not this trait method.
        crate::wom::WomClient::persist(self, envelope).await
    }

    async fn fetch(&self, report_id: u64) -> Result<Option<RemoteReport>> {
        crate::wom::WomClient::fetch(self, report_id).await
    }
}

#[async_trait]
impl<T: ReportGateway + ?Sized> ReportGateway for Arc<T> {
    async fn persist(&self, envelope: &VerifiableEnvelope) -> Result<RemoteReport> {
        (**self).persist(envelope).await
    }

    async fn fetch(&self, report_id: u64) -> Result<Option<RemoteReport>> {
        (**self).fetch(report_id).await
    }
}

/// Reward-computation collaborator: supplies periods and their computed
/// activity numbers. All heavy computation stays in the hosting application.
pub trait RewardReportProvider: Send + Sync {
    /// Resolve a period by its durable id.
    fn reward_period(&self, period_id: u64) -> Option<RewardPeriod>;
    /// Known periods, newest first, paginated.
    fn list_periods(&self, offset: usize, limit: usize) -> Vec<RewardPeriod>;
    /// Computed metrics for a period; `None` while the period's reward run
    /// has not completely finished.
    fn metrics(&self, period: &RewardPeriod) -> Option<ReportMetrics>;
}

/// Identity collaborator: deed binding, passphrase custody and join date.
pub trait HubIdentityProvider: Send + Sync {
    fn deed_id(&self) -> u64;
    /// Passphrase protecting the hub keystore. Failure here means the wallet
    /// is unusable until an operator intervenes.
    fn admin_passphrase(&self) -> Result<String>;
    /// Secret key bytes to adopt when the hub wallet is first created;
    /// `None` generates a fresh key.
    fn admin_key_material(&self) -> Option<Vec<u8>>;
    /// Instant the hub joined the network, epoch seconds. Periods ending
    /// before it are not reportable.
    fn hub_join_date_seconds(&self) -> u64;
}

/// Coordinates custody, lifecycle, chain and WoM into the exposed operations.
pub struct ReportOrchestrator<S, R, I, C, G> {
    lifecycle: ReportLifecycleStore<S>,
    custody: WalletCustody<S>,
    rewards: R,
    identity: I,
    chain: C,
    gateway: G,
    period_locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, R, I, C, G> ReportOrchestrator<S, R, I, C, G>
where
    S: SettingsStore,
    R: RewardReportProvider,
    I: HubIdentityProvider,
    C: ReportChain,
    G: ReportGateway,
{
    pub fn new(store: Arc<S>, rewards: R, identity: I, chain: C, gateway: G) -> Self {
        Self {
            lifecycle: ReportLifecycleStore::new(Arc::clone(&store)),
            custody: WalletCustody::new(store),
            rewards,
            identity,
            chain,
            gateway,
            period_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn lifecycle(&self) -> &ReportLifecycleStore<S> {
        &self.lifecycle
    }

    /// The hub address, creating the wallet on first use.
    pub fn get_or_create_hub_address(&self) -> Result<Address> {
        let passphrase = self.identity.admin_passphrase()?;
        self.custody
            .get_or_create_address(&passphrase, self.identity.admin_key_material().as_deref())
    }

    /// Build, sign, submit and persist the report of one period.
    pub async fn send(&self, period_id: u64) -> Result<LocalReportView> {
        let period = self
            .rewards
            .reward_period(period_id)
            .ok_or_else(|| Error::domain("wom.unableToRetrieveReward"))?;
        let metrics = self.rewards.metrics(&period).ok_or_else(|| {
            Error::Validation(format!(
                "reward run of period {period_id} has not completely finished"
            ))
        })?;
        if !self.is_period_reportable(&period) {
            return Err(Error::InvalidPeriod(format!(
                "period {period_id} ends before the hub joined the network"
            )));
        }

        let passphrase = self.identity.admin_passphrase()?;
        let hub_address = self
            .custody
            .get_or_create_address(&passphrase, self.identity.admin_key_material().as_deref())?;
        let sent_at = self.lifecycle.sent_date_or_now(period_id);
        let payload =
            build_report(&period, &metrics, &hub_address, self.identity.deed_id(), sent_at)?;
        let wallet = self.custody.load_key_pair(&passphrase)?;
        let signature = wallet.sign_message(&payload.canonical_bytes()?)?;
        let envelope = VerifiableEnvelope::seal(payload.clone(), &signature)?;

        // One in-flight submission per period, enforced twice: the async lock
        // serializes racing tasks, the SENDING transition rejects reentry
        // across restarts.
        let lock = self.period_lock(period_id);
        let _guard = lock.lock().await;
        self.lifecycle.begin_sending(period_id)?;

        info!(
            period_id,
            from_date = payload.from_date,
            to_date = payload.to_date,
            "sending hub report"
        );
        let started = Instant::now();
        match self.submit_and_persist(envelope, &wallet).await {
            Ok(remote) => {
                let sent_date = remote.sent_date.unwrap_or(sent_at);
                self.lifecycle.mark_sent(period_id, remote.report_id, sent_date)?;
                info!(
                    period_id,
                    report_id = remote.report_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "hub report sent"
                );
                Ok(self.view_for(period_id, Some(payload), Some(remote)))
            }
            Err(e) => {
                let token = e.domain_token().unwrap_or_else(|| "wom.unknownError".to_string());
                if let Err(store_err) = self.lifecycle.mark_error(period_id, &token) {
                    warn!(period_id, error = %store_err, "failed to record send error");
                }
                warn!(period_id, token = %token, error = %e, "hub report send failed");
                Err(e)
            }
        }
    }

    /// Re-fetch the remote copy of an already-sent report. Never mutates the
    /// local lifecycle.
    pub async fn refresh(&self, period_id: u64) -> Result<LocalReportView> {
        let report_id = self.lifecycle.report_id(period_id);
        if report_id == 0 {
            return Err(Error::domain("wom.notSentReward"));
        }
        let remote = self
            .gateway
            .fetch(report_id)
            .await?
            .ok_or_else(|| Error::domain("wom.rewardNotFoundInWom"))?;
        if let Some(hub_address) = self.custody.address() {
            if !address::eq_ignore_case(&remote.hub_address, &hub_address) {
                return Err(Error::domain("wom.rewardNotFoundInWom"));
            }
        }
        let payload = self.recompute_payload(period_id);
        Ok(self.view_for(period_id, payload, Some(remote)))
    }

    /// Locally-known status of recent periods, metrics recomputed fresh; no
    /// remote calls.
    pub fn list(&self, offset: usize, limit: usize) -> Vec<LocalReportView> {
        self.rewards
            .list_periods(offset, limit)
            .into_iter()
            .map(|period| {
                let payload = self
                    .rewards
                    .metrics(&period)
                    .and_then(|metrics| self.build_local_payload(&period, &metrics));
                self.view_for(period.id, payload, None)
            })
            .collect()
    }

    // --------------------------- internals ----------------------------------

    async fn submit_and_persist(
        &self,
        envelope: VerifiableEnvelope,
        wallet: &HubWallet,
    ) -> Result<RemoteReport> {
        let report_id = self.chain.submit_report(&envelope.payload, wallet).await?;
        let envelope = envelope.with_report_id(report_id);
        let remote = self.gateway.persist(&envelope).await?;
        if let Some(error) = remote.error.as_deref().filter(|e| !e.trim().is_empty()) {
            return Err(Error::domain(error.trim().to_string()));
        }
        // Trust the chain-assigned id over whatever the gateway echoes.
        let mut remote = remote;
        if remote.report_id == 0 {
            remote.report_id = report_id;
        }
        Ok(remote)
    }

    fn view_for(
        &self,
        period_id: u64,
        payload: Option<ReportPayload>,
        remote: Option<RemoteReport>,
    ) -> LocalReportView {
        let record = self.lifecycle.status(period_id);
        let reportable = self
            .rewards
            .reward_period(period_id)
            .map(|p| self.is_period_reportable(&p))
            .unwrap_or(true);
        let mut status = record.status;
        if status == ReportStatus::None && !reportable {
            status = ReportStatus::Invalid;
        }
        let has_report_id = record.report_id != 0;
        LocalReportView {
            period_id,
            report_id: record.report_id,
            status,
            error: record.error,
            // status must permit it AND the period must still be reportable
            can_send: status.can_send(has_report_id) && reportable,
            can_refresh: status.can_refresh() && has_report_id,
            sent_date: record.sent_at,
            payload,
            remote,
        }
    }

    fn recompute_payload(&self, period_id: u64) -> Option<ReportPayload> {
        let period = self.rewards.reward_period(period_id)?;
        let metrics = self.rewards.metrics(&period)?;
        self.build_local_payload(&period, &metrics)
    }

    fn build_local_payload(
        &self,
        period: &RewardPeriod,
        metrics: &ReportMetrics,
    ) -> Option<ReportPayload> {
        let hub_address = self.custody.address()?;
        let sent_at = self.lifecycle.sent_date_or_now(period.id);
        build_report(period, metrics, &hub_address, self.identity.deed_id(), sent_at).ok()
    }

    fn is_period_reportable(&self, period: &RewardPeriod) -> bool {
        period.end_date_in_seconds > self.identity.hub_join_date_seconds()
    }

    fn period_lock(&self, period_id: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.period_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(period_id).or_default())
    }
}
