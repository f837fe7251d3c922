//! Error types for the permission engine.
//!
//! Every failure the engine or its repositories can report is an
//! [`AuthzError`]. Callers that need a stable, transport-friendly code use
//! [`AuthzError::kind`], which maps each variant onto one [`ErrorKind`].

use std::fmt;

use thiserror::Error;

/// Stable classification of an [`AuthzError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionNotFound,
    RoleNotFound,
    PolicyNotFound,
    RoleAlreadyAssigned,
    RoleNotAssigned,
    SystemRoleImmutable,
    InvalidPermission,
    InvalidRole,
    InvalidPolicy,
    PermissionDenied,
    InvalidEvaluationContext,
    Repository,
    InvalidSeed,
}

impl ErrorKind {
    /// Upper-snake code for this kind, e.g. `ROLE_NOT_FOUND`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PermissionNotFound => "PERMISSION_NOT_FOUND",
            ErrorKind::RoleNotFound => "ROLE_NOT_FOUND",
            ErrorKind::PolicyNotFound => "POLICY_NOT_FOUND",
            ErrorKind::RoleAlreadyAssigned => "ROLE_ALREADY_ASSIGNED",
            ErrorKind::RoleNotAssigned => "ROLE_NOT_ASSIGNED",
            ErrorKind::SystemRoleImmutable => "SYSTEM_ROLE_IMMUTABLE",
            ErrorKind::InvalidPermission => "INVALID_PERMISSION",
            ErrorKind::InvalidRole => "INVALID_ROLE",
            ErrorKind::InvalidPolicy => "INVALID_POLICY",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::InvalidEvaluationContext => "INVALID_EVALUATION_CONTEXT",
            ErrorKind::Repository => "REPOSITORY",
            ErrorKind::InvalidSeed => "INVALID_SEED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sub-evaluation that was running when a repository call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationPhase {
    Rbac,
    Abac,
}

impl fmt::Display for EvaluationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationPhase::Rbac => f.write_str("rbac"),
            EvaluationPhase::Abac => f.write_str("abac"),
        }
    }
}

/// Errors that can occur while managing roles and policies or evaluating access.
///
/// Business failures (missing aggregates, duplicate assignment, immutable
/// system roles) are ordinary variants. Repository failures raised during an
/// evaluation are wrapped in [`AuthzError::Evaluation`] so callers can tell
/// "denied" apart from "could not be decided".
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Permission not found: {0}")]
    PermissionNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Policy not found: {0}")]
    PolicyNotFound(String),

    #[error("Role {role_id} is already assigned to user {user_id}")]
    RoleAlreadyAssigned { user_id: String, role_id: String },

    #[error("Role {role_id} is not assigned to user {user_id}")]
    RoleNotAssigned { user_id: String, role_id: String },

    #[error("System role {0} cannot be modified")]
    SystemRoleImmutable(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid evaluation context: {0}")]
    InvalidEvaluationContext(String),

    /// A repository could not complete the requested operation.
    #[error("Repository error: {0}")]
    Repository(String),

    /// A seed document could not be read or parsed.
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// A repository call failed while a sub-evaluation was running.
    #[error("{phase} evaluation failed: {source}")]
    Evaluation {
        phase: EvaluationPhase,
        #[source]
        source: Box<AuthzError>,
    },
}

impl AuthzError {
    /// Wrap a repository failure with the evaluation phase it interrupted.
    pub fn in_phase(self, phase: EvaluationPhase) -> Self {
        AuthzError::Evaluation {
            phase,
            source: Box::new(self),
        }
    }

    /// The classification of this error. Wrapped errors report the kind of
    /// the underlying failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::PermissionNotFound(_) => ErrorKind::PermissionNotFound,
            AuthzError::RoleNotFound(_) => ErrorKind::RoleNotFound,
            AuthzError::PolicyNotFound(_) => ErrorKind::PolicyNotFound,
            AuthzError::RoleAlreadyAssigned { .. } => ErrorKind::RoleAlreadyAssigned,
            AuthzError::RoleNotAssigned { .. } => ErrorKind::RoleNotAssigned,
            AuthzError::SystemRoleImmutable(_) => ErrorKind::SystemRoleImmutable,
            AuthzError::InvalidPermission(_) => ErrorKind::InvalidPermission,
            AuthzError::InvalidRole(_) => ErrorKind::InvalidRole,
            AuthzError::InvalidPolicy(_) => ErrorKind::InvalidPolicy,
            AuthzError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AuthzError::InvalidEvaluationContext(_) => ErrorKind::InvalidEvaluationContext,
            AuthzError::Repository(_) => ErrorKind::Repository,
            AuthzError::InvalidSeed(_) => ErrorKind::InvalidSeed,
            AuthzError::Evaluation { source, .. } => source.kind(),
        }
    }

    /// The phase that failed, if this error came out of an evaluation.
    pub fn phase(&self) -> Option<EvaluationPhase> {
        match self {
            AuthzError::Evaluation { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
