//! Recurring verification sweep and on-demand entry points
//!
//! The sweep runs once as soon as the scheduler starts and then on every
//! interval tick. Each appointment is verified as its own atomic unit, so one
//! failing appointment is logged and counted without rolling back the others.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use logger_redacted::{redacted_error, redacted_warn};
use tracing::{error, info, instrument, warn};

use crate::settings::EngineConfig;
use crate::eligibility::EligibilityVerifier;
use crate::error::{InsuranceError, InsuranceResult};
use crate::models::{ReverifyResult, SimulationResult, VerificationStatus};
use crate::store::VerificationStore;

/// How long `shutdown` waits for an in-flight sweep before aborting it
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub const UNKNOWN_PATIENT: &str = "Unknown patient";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Idle,
    Sweeping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub checked: usize,
    pub verified: usize,
    /// Runs that ended in `needs_review` or `expired`
    pub flagged: usize,
    pub failed: usize,
    pub pruned_logs: u64,
}

struct SweepTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct SchedulerShared {
    verifier: Arc<EligibilityVerifier>,
    config: EngineConfig,
    state: watch::Sender<SchedulerState>,
    // only touched inside the `state` sender's modify closures
    in_flight: AtomicUsize,
    running: AtomicBool,
}

/// Leaves the `Sweeping` state when dropped, including on abort
struct SweepGuard<'a> {
    shared: &'a SchedulerShared,
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.shared.finish_sweep();
    }
}

impl SchedulerShared {
    fn store(&self) -> &Arc<dyn VerificationStore> {
        self.verifier.store()
    }

    fn provider_for(&self, provider: Option<&str>) -> String {
        provider
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.config.default_provider())
            .to_string()
    }

    fn settled_state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Idle
        } else {
            SchedulerState::Stopped
        }
    }

    fn begin_sweep(&self) -> SweepGuard<'_> {
        self.state.send_modify(|state| {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            *state = SchedulerState::Sweeping;
        });
        SweepGuard { shared: self }
    }

    fn finish_sweep(&self) {
        self.state.send_if_modified(|state| {
            if self.in_flight.fetch_sub(1, Ordering::SeqCst) != 1 {
                return false;
            }
            let next = self.settled_state();
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    /// Flip the timer flag; an in-flight sweep keeps the state at `Sweeping`
    fn set_running(&self, running: bool) {
        self.state.send_if_modified(|state| {
            self.running.store(running, Ordering::SeqCst);
            if self.in_flight.load(Ordering::SeqCst) > 0 {
                return false;
            }
            let next = self.settled_state();
            let changed = *state != next;
            *state = next;
            changed
        });
    }

    #[instrument(skip(self))]
    async fn run_sweep(&self, now: DateTime<Utc>) -> InsuranceResult<SweepSummary> {
        let _guard = self.begin_sweep();
        self.sweep_window(now).await
    }

    async fn sweep_window(&self, now: DateTime<Utc>) -> InsuranceResult<SweepSummary> {
        let window_end = now + self.config.lookahead();
        let appointments = self.store().appointments_between(now, window_end).await?;

        let mut summary = SweepSummary {
            window_start: now,
            window_end,
            checked: appointments.len(),
            verified: 0,
            flagged: 0,
            failed: 0,
            pruned_logs: 0,
        };

        let outcomes: Vec<_> = stream::iter(appointments)
            .map(|appointment| async move {
                let provider = self.provider_for(appointment.provider.as_deref());
                let outcome = self.verifier.run_check(&appointment, Some(provider.as_str()), false).await;
                (appointment.id, outcome)
            })
            .buffer_unordered(self.config.sweep_concurrency.max(1))
            .collect()
            .await;

        for (appointment_id, outcome) in outcomes {
            match outcome {
                Ok(run) if run.status == VerificationStatus::Verified => summary.verified += 1,
                Ok(_) => summary.flagged += 1,
                Err(e) => {
                    warn!(appointment_id, error = %e, "Verification failed, continuing sweep");
                    summary.failed += 1;
                }
            }
        }

        if let Some(retention) = self.config.log_retention() {
            match self.store().prune_logs_before(now - retention).await {
                Ok(pruned) => summary.pruned_logs = pruned,
                Err(e) => warn!(error = %e, "Verification log pruning failed"),
            }
        }

        info!(
            checked = summary.checked,
            verified = summary.verified,
            flagged = summary.flagged,
            failed = summary.failed,
            pruned_logs = summary.pruned_logs,
            "Verification sweep complete"
        );
        Ok(summary)
    }
}

pub struct VerificationScheduler {
    shared: Arc<SchedulerShared>,
    task: Mutex<Option<SweepTask>>,
}

impl VerificationScheduler {
    pub fn new(verifier: Arc<EligibilityVerifier>, config: EngineConfig) -> Self {
        let (state, _) = watch::channel(SchedulerState::Stopped);
        Self {
            shared: Arc::new(SchedulerShared {
                verifier,
                config,
                state,
                in_flight: AtomicUsize::new(0),
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Start the recurring sweep; the first sweep runs immediately
    ///
    /// Returns `false` without side effects if already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let period = shared.config.sweep_interval();
        shared.set_running(true);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = shared.run_sweep(Utc::now()).await {
                            redacted_error!("Verification sweep aborted: {}", e);
                        }
                    }
                }
            }
            shared.set_running(false);
        });

        *task = Some(SweepTask { shutdown: shutdown_tx, handle });
        info!(interval_secs = period.as_secs(), "Verification scheduler started");
        true
    }

    /// Stop the recurring sweep, letting an in-flight sweep finish
    ///
    /// Returns `false` if the scheduler was not running.
    pub async fn shutdown(&self) -> bool {
        let Some(SweepTask { shutdown, mut handle }) = self.task.lock().await.take() else {
            return false;
        };

        let _ = shutdown.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Verification scheduler task failed"),
            Err(_) => {
                warn!("Sweep still running after grace period, aborting");
                handle.abort();
            }
        }
        // a sweep dropped by `abort` settles through its guard
        self.shared.set_running(false);
        info!("Verification scheduler stopped");
        true
    }

    /// One sweep over `[now, now + lookahead]`, independent of the timer
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> InsuranceResult<SweepSummary> {
        self.shared.run_sweep(now).await
    }

    /// Manual re-verification of a single appointment
    #[instrument(skip(self))]
    pub async fn reverify_appointment(&self, appointment_id: i64) -> InsuranceResult<ReverifyResult> {
        let appointment = self
            .shared
            .store()
            .get_appointment(appointment_id)
            .await?
            .ok_or_else(|| InsuranceError::not_found("appointment", appointment_id))?;

        let provider = self.shared.provider_for(appointment.provider.as_deref());
        let run = self.shared.verifier.run_check(&appointment, Some(provider.as_str()), true).await?;

        Ok(ReverifyResult {
            appointment_id,
            status: run.status,
            provider: run.appointment.provider.unwrap_or(provider),
            copay: run.appointment.copay,
        })
    }

    /// Verify a clinic's soonest `limit` appointments, in scheduled order
    ///
    /// A failing appointment is logged and left out of the results; the rest
    /// of the batch still runs.
    #[instrument(skip(self))]
    pub async fn simulate_clinic(&self, clinic_id: i64, limit: usize) -> InsuranceResult<Vec<SimulationResult>> {
        let store = self.shared.store();
        let appointments = store.clinic_appointments(clinic_id, limit).await?;

        let mut results = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let provider = self.shared.provider_for(appointment.provider.as_deref());
            let run = match self.shared.verifier.run_check(&appointment, Some(provider.as_str()), false).await {
                Ok(run) => run,
                Err(e) => {
                    redacted_warn!(
                        "Simulation failed for appointment {}, continuing batch: {}",
                        appointment.id,
                        e
                    );
                    continue;
                }
            };

            let patient = match store.get_patient(appointment.patient_id).await {
                Ok(Some(patient)) => patient.display_name(),
                Ok(None) => UNKNOWN_PATIENT.to_string(),
                Err(e) => {
                    warn!(appointment_id = appointment.id, error = %e, "Patient lookup failed");
                    UNKNOWN_PATIENT.to_string()
                }
            };
            results.push(SimulationResult {
                appointment_id: appointment.id,
                patient,
                provider: run.record.provider,
                status: run.status,
                copay: run.record.copay,
                last_checked: run.record.last_checked.unwrap_or_else(Utc::now),
            });
        }

        info!(clinic_id, simulated = results.len(), "Bulk verification simulation complete");
        Ok(results)
    }
}

impl Drop for VerificationScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.handle.abort();
        }
    }
}
