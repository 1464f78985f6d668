//! Exercise-run session
//!
//! Owns the stage counter, the registry of in-flight operation tasks,
//! and the run's failure bookkeeping. The per-variant operation
//! spawners live in `ops.rs`.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::stage::StageCounter;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dnssd_client::{DnssdClient, OperationFailure, ServiceLocation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// One exercise run against a discovery client.
///
/// The session is the single source of truth for "is the run
/// finished": operation tasks report outcomes to it, and the driver
/// blocks in [`wait_for_change`](Session::wait_for_change) until the
/// stage counter moves.
pub struct Session {
    /// The discovery facility under exercise
    pub(crate) client: Arc<dyn DnssdClient>,

    /// Run parameters
    pub(crate) config: HarnessConfig,

    /// Completion signal
    stage: StageCounter,

    /// In-flight operation tasks, keyed by name
    pub(crate) tasks: DashMap<String, JoinHandle<()>>,

    /// Instances a resolve has already been started for, with the
    /// time of their first appearance (dedup bookkeeping)
    pub(crate) resolved: DashMap<ServiceLocation, DateTime<Utc>>,

    /// Operations that failed or could not be started
    failures: AtomicU64,
}

impl Session {
    /// Creates a session for one run.
    pub fn new(client: Arc<dyn DnssdClient>, config: HarnessConfig) -> Result<Self> {
        config.validate().map_err(HarnessError::InvalidConfig)?;

        Ok(Self {
            client,
            config,
            stage: StageCounter::new(),
            tasks: DashMap::new(),
            resolved: DashMap::new(),
            failures: AtomicU64::new(0),
        })
    }

    /// Starts the initial operations of the run: Register, Browse, and
    /// DomainEnumerate.
    ///
    /// A Register start error aborts bootstrap; Browse and
    /// DomainEnumerate start errors are recorded and the run continues
    /// without them.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        info!(
            service_type = %self.config.service_type,
            instance = %self.config.instance_name,
            port = self.config.port,
            "starting exercise run"
        );

        self.start_register()?;

        if let Err(e) = self.start_browse() {
            self.record_start_error("browse", &e);
        }
        if let Err(e) = self.start_domain_enumerate() {
            self.record_start_error("domain enumeration", &e);
        }

        Ok(())
    }

    /// Non-blocking read of the stage counter, for bootstrapping a
    /// wait.
    pub fn current_stage(&self) -> u64 {
        self.stage.current()
    }

    /// Suspends until the stage counter differs from `last_observed`;
    /// a change is this run's "concluded" signal.
    pub async fn wait_for_change(&self, last_observed: u64) -> u64 {
        self.stage.wait_for_change(last_observed).await
    }

    /// Number of operation failures observed so far.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Aborts all in-flight operation tasks, releasing their handles.
    pub fn stop(&self) {
        let names: Vec<String> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            if let Some((_, handle)) = self.tasks.remove(&name) {
                handle.abort();
            }
        }
    }

    /// Marks the run concluded and wakes the driver.
    pub(crate) fn complete(&self) {
        self.stage.bump();
    }

    pub(crate) fn record_failure(&self, operation: &str, failure: &OperationFailure) {
        error!(
            operation,
            code = failure.code,
            message = %failure.message,
            "operation failed"
        );
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_start_error(&self, operation: &str, error: &dyn std::fmt::Display) {
        error!(operation, error = %error, "operation could not be started");
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}
