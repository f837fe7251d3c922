//! The hybrid RBAC/ABAC evaluator.
//!
//! ```text
//! EvaluationContext ──┬── RbacEvaluator ──┐
//!                     │                   ├── combine ── EvaluationResult
//!                     └── AbacEvaluator ──┘
//! ```
//!
//! The two sub-evaluations are independent and run concurrently; the
//! combiner is a pure function of both results. Neither evaluator keeps
//! state between calls, so one [`Evaluator`] can be shared across tasks.

pub mod abac;
pub mod combiner;
pub mod rbac;

use std::sync::Arc;

use tracing::debug;

pub use abac::{AbacEvaluator, AbacOutcome, PolicyOutcome, PolicyTrace, SkipReason};
pub use combiner::combine;
pub use rbac::RbacEvaluator;

use crate::context::{EvaluationContext, EvaluationResult};
use crate::error::Result;
use crate::repository::{PolicyRepository, RoleRepository};

/// Both sub-decisions, the combined decision, and the ABAC scan trace.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub result: EvaluationResult,
    pub rbac: EvaluationResult,
    pub abac: EvaluationResult,
    pub policy_trace: Vec<PolicyTrace>,
}

/// Decides access by combining role grants with attribute policies.
pub struct Evaluator {
    rbac: RbacEvaluator,
    abac: AbacEvaluator,
}

impl Evaluator {
    pub fn new(roles: Arc<dyn RoleRepository>, policies: Arc<dyn PolicyRepository>) -> Self {
        Self {
            rbac: RbacEvaluator::new(roles),
            abac: AbacEvaluator::new(policies),
        }
    }

    /// Evaluates a request and returns the combined decision.
    pub async fn evaluate(&self, ctx: &EvaluationContext) -> Result<EvaluationResult> {
        Ok(self.explain(ctx).await?.result)
    }

    /// Evaluates a request and keeps every intermediate result.
    ///
    /// An invalid context is rejected before either sub-evaluation runs. A
    /// repository failure in either phase fails the whole call.
    pub async fn explain(&self, ctx: &EvaluationContext) -> Result<Explanation> {
        ctx.validate()?;

        let (rbac, abac) = tokio::try_join!(self.rbac.evaluate(ctx), self.abac.evaluate(ctx))?;
        let result = combine(&rbac, &abac.result);

        debug!(
            "Decision for user {} {} {}: {} ({})",
            ctx.user_id, ctx.action, ctx.resource, result.effect, result.reason
        );

        Ok(Explanation {
            result,
            rbac,
            abac: abac.result,
            policy_trace: abac.trace,
        })
    }
}
