use std::sync::Arc;

use events_bus::{BroadcastHub, HubEvent, Observer, ObserverId};
use tracing::info;

use crate::alerts::AlertGenerator;
use crate::settings::EngineConfig;
use crate::eligibility::EligibilityVerifier;
use crate::error::{InsuranceError, InsuranceResult};
use crate::models::*;
use crate::oracle::CoverageOracle;
use crate::payer::PayerSimulator;
use crate::scheduler::VerificationScheduler;
use crate::store::VerificationStore;

/// Inbound surface of the verification engine
///
/// Owns the record manager, alert generator, scheduler and payer simulator,
/// all sharing one store and one broadcast hub.
pub struct InsuranceService {
    store: Arc<dyn VerificationStore>,
    hub: BroadcastHub,
    verifier: Arc<EligibilityVerifier>,
    scheduler: Arc<VerificationScheduler>,
    payer: PayerSimulator,
    config: EngineConfig,
}

impl InsuranceService {
    pub fn new(store: Arc<dyn VerificationStore>, hub: BroadcastHub, config: EngineConfig) -> Self {
        let alerts = AlertGenerator::new(Arc::clone(&store), hub.clone());
        let verifier = EligibilityVerifier::new(Arc::clone(&store), alerts, config.default_provider());
        Self::assemble(store, hub, verifier, config)
    }

    /// Same as [`InsuranceService::new`] with a different coverage oracle
    pub fn with_oracle(
        store: Arc<dyn VerificationStore>,
        hub: BroadcastHub,
        config: EngineConfig,
        oracle: Arc<dyn CoverageOracle>,
    ) -> Self {
        let alerts = AlertGenerator::new(Arc::clone(&store), hub.clone());
        let verifier = EligibilityVerifier::new(Arc::clone(&store), alerts, config.default_provider())
            .with_oracle(oracle);
        Self::assemble(store, hub, verifier, config)
    }

    fn assemble(
        store: Arc<dyn VerificationStore>,
        hub: BroadcastHub,
        verifier: EligibilityVerifier,
        config: EngineConfig,
    ) -> Self {
        let verifier = Arc::new(verifier);
        let scheduler = Arc::new(VerificationScheduler::new(Arc::clone(&verifier), config.clone()));
        let payer = PayerSimulator::new(Arc::clone(&store));
        Self { store, hub, verifier, scheduler, payer, config }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }

    pub fn verifier(&self) -> &Arc<EligibilityVerifier> {
        &self.verifier
    }

    pub fn scheduler(&self) -> &Arc<VerificationScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn trigger_manual_reverify(&self, appointment_id: i64) -> InsuranceResult<ReverifyResult> {
        self.scheduler.reverify_appointment(appointment_id).await
    }

    /// Bulk simulation bounded by the configured limit
    pub async fn trigger_bulk_simulation(&self, clinic_id: i64) -> InsuranceResult<Vec<SimulationResult>> {
        self.trigger_bulk_simulation_with_limit(clinic_id, self.config.bulk_simulation_limit)
            .await
    }

    pub async fn trigger_bulk_simulation_with_limit(
        &self,
        clinic_id: i64,
        limit: usize,
    ) -> InsuranceResult<Vec<SimulationResult>> {
        self.scheduler.simulate_clinic(clinic_id, limit).await
    }

    pub async fn observer_subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        self.hub.connect(observer).await
    }

    pub async fn observer_unsubscribe(&self, id: ObserverId) -> bool {
        self.hub.disconnect(id).await
    }

    pub async fn list_alerts(&self, clinic_id: i64) -> InsuranceResult<Vec<Alert>> {
        self.store.clinic_alerts(clinic_id).await
    }

    /// Toggle an alert's resolution flag and tell observers
    ///
    /// Alerts on another clinic's appointments are reported as not found.
    pub async fn resolve_alert(&self, clinic_id: i64, alert_id: i64, resolved: bool) -> InsuranceResult<Alert> {
        let alert = self
            .store
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| InsuranceError::not_found("alert", alert_id))?;
        let in_clinic = self
            .store
            .get_appointment(alert.appointment_id)
            .await?
            .is_some_and(|appointment| appointment.clinic_id == clinic_id);
        if !in_clinic {
            return Err(InsuranceError::not_found("alert", alert_id));
        }

        let alert = self.store.set_alert_resolved(alert_id, resolved).await?;
        info!(alert_id, resolved, "Alert resolution updated");
        self.hub.broadcast(&HubEvent::alert_update(alert.id, alert.resolved)).await;
        Ok(alert)
    }

    pub async fn verify_payer(
        &self,
        payer_id: &str,
        request: &PayerVerificationRequest,
    ) -> InsuranceResult<PayerVerificationResponse> {
        self.payer.verify(payer_id, request).await
    }
}
