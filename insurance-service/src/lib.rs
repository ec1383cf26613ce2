//! Insurance eligibility verification engine
//!
//! Provides:
//! - A deterministic coverage oracle keyed on (patient, appointment)
//! - The record manager that applies a verification as one atomic unit
//! - Alert generation and push to connected observers
//! - A recurring sweep over upcoming appointments, plus manual re-checks
//!   and bounded per-clinic bulk simulation
//! - A payer lookup simulator
//!
//! Persistence goes through [`store::VerificationStore`], with in-memory and
//! PostgreSQL implementations.

pub mod alerts;
pub mod eligibility;
pub mod error;
pub mod models;
pub mod oracle;
pub mod payer;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod store;

pub use alerts::*;
pub use eligibility::*;
pub use error::*;
pub use models::*;
pub use oracle::{CoverageOracle, CoverageOutcome, DeterministicOracle};
pub use payer::*;
pub use scheduler::*;
pub use service::*;
pub use settings::*;
pub use store::{InMemoryVerificationStore, PgVerificationStore, VerificationStore};
