//! Hybrid RBAC/ABAC permission engine.
//!
//! Access decisions combine two models:
//!
//! - **RBAC**: a user holds roles, roles hold permissions, and a permission
//!   names a `(resource, action)` pair.
//! - **ABAC**: policies target a `(resource, action)` pair and carry
//!   attribute conditions over the request. A matching policy explicitly
//!   allows or denies.
//!
//! # Decision Flow
//!
//! 1. **Context**: [`PermissionService`] resolves the user's roles and builds
//!    an [`EvaluationContext`]
//! 2. **Evaluation**: the [`Evaluator`] runs both sub-evaluations concurrently
//! 3. **Combination**: an explicit policy deny wins, then an explicit policy
//!    allow, then the RBAC result
//! 4. **Default**: with no grant and no matching policy the request is denied
//!
//! # Storage
//!
//! Persistence sits behind the async traits in [`repository`]. The crate
//! ships [`InMemoryStore`], which implements all of them and can be filled
//! from a YAML [`Seed`].

pub mod catalog;
pub mod condition;
pub mod context;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod memory;
pub mod permission;
pub mod policy;
pub mod repository;
pub mod role;
pub mod seed;
pub mod service;
pub mod types;

pub use catalog::CatalogService;
pub use condition::{ConditionValue, Conditions};
pub use context::{EvaluationContext, EvaluationResult, MatchedRule};
pub use engine::{Evaluator, Explanation, PolicyOutcome, PolicyTrace, SkipReason};
pub use error::{AuthzError, ErrorKind, Result};
pub use memory::InMemoryStore;
pub use permission::Permission;
pub use policy::{Policy, PolicyUpdate};
pub use role::Role;
pub use seed::Seed;
pub use service::PermissionService;
pub use types::{
    ActionType, AttributeValue, Attributes, Effect, PermissionId, PolicyId, ResourceType, RoleId,
    UserId,
};
