//! # wardstone-catalog: Role and permission catalog
//!
//! The catalog is the authoritative map of what each role may do:
//! - [`Role`] definitions with parent links, constraints, and priority
//! - [`Permission`] grants with ownership scope, time constraint, and
//!   attribute conditions
//! - The builtin healthcare catalog ([`RoleCatalog::builtin`]) with twelve
//!   system roles
//! - Hierarchy expansion ([`RoleCatalog::expand`]) via an iterative
//!   visited-set walk, so misconfigured cycles cannot recurse
//! - The separation-of-duties conflict table
//!   ([`RoleCatalog::find_conflict`])
//!
//! The catalog holds no user state. Assignments live in
//! `wardstone-lifecycle`; evaluation lives in `wardstone-pdp`.

mod catalog;
mod permission;
mod role;

pub use catalog::{
    CatalogError, EMERGENCY_RESPONDER, PermissionMatrix, PermissionMatrixEntry,
    PermissionMatrixRole, Result, RoleCatalog,
};
pub use permission::{AttributeCondition, ConditionOp, OwnershipScope, Permission, TimeConstraint};
pub use role::{Role, RoleConstraint};
