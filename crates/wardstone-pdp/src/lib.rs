//! # wardstone-pdp: Policy decision point
//!
//! Pure request evaluation for the hybrid RBAC/ABAC model:
//! - Effective-role resolution over the catalog hierarchy
//!   ([`effective_role_entries`])
//! - The decision pipeline ([`evaluate`]): role constraints, permission
//!   matching with short-circuit, attribute fallback, break-glass
//! - Stable, machine-parseable decision traces for the audit trail
//!
//! This crate holds no state and performs no I/O. Persisting emergency
//! records, writing audit entries, and caching decisions belong to the
//! engine crate driving it; [`Evaluation::emergency`] tells that caller
//! when a grant is contingent on a durable record.

mod evaluate;
mod roles;

pub use evaluate::{
    EmergencyGrant, Evaluation, EvaluationConfig, JUSTIFICATION_ATTRIBUTE, evaluate,
};
pub use roles::{EffectiveRoleEntry, effective_role_entries};
