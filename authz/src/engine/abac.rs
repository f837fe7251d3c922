use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::condition::{ConditionError, ConditionEvaluator, ConditionFailure};
use crate::context::{EvaluationContext, EvaluationResult, MatchedRule};
use crate::error::{EvaluationPhase, Result};
use crate::policy::Policy;
use crate::repository::PolicyRepository;
use crate::types::PolicyId;

pub(crate) const NO_POLICY_MATCH: &str = "no matching policy";

/// Why a policy was passed over without evaluating its conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Inactive,
    /// Returned by the repository for a different resource or action.
    OtherTarget,
    MalformedConditions(ConditionError),
}

/// What happened to one policy during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Matched,
    NotMatched(ConditionFailure),
    Skipped(SkipReason),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Inactive => f.write_str("inactive"),
            SkipReason::OtherTarget => f.write_str("targets another resource or action"),
            SkipReason::MalformedConditions(err) => write!(f, "malformed conditions: {}", err),
        }
    }
}

impl fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyOutcome::Matched => f.write_str("matched"),
            PolicyOutcome::NotMatched(failure) => write!(f, "not matched: {}", failure),
            PolicyOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// One scanned policy, in scan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTrace {
    pub policy_id: PolicyId,
    pub name: String,
    pub priority: i32,
    pub outcome: PolicyOutcome,
}

/// The ABAC decision plus the policies that were looked at to reach it.
#[derive(Debug, Clone)]
pub struct AbacOutcome {
    pub result: EvaluationResult,
    pub trace: Vec<PolicyTrace>,
}

/// Orders candidates by priority, highest first, then by id ascending.
pub fn sort_by_priority(policies: &mut [Policy]) {
    policies.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| a.id().cmp(b.id()))
    });
}

/// Applies the first active policy whose conditions hold.
pub struct AbacEvaluator {
    policies: Arc<dyn PolicyRepository>,
}

impl AbacEvaluator {
    pub fn new(policies: Arc<dyn PolicyRepository>) -> Self {
        Self { policies }
    }

    pub async fn evaluate(&self, ctx: &EvaluationContext) -> Result<AbacOutcome> {
        let mut candidates = self
            .policies
            .find_by_resource_and_action(&ctx.resource, &ctx.action)
            .await
            .map_err(|e| e.in_phase(EvaluationPhase::Abac))?;

        if candidates.is_empty() {
            return Ok(AbacOutcome {
                result: EvaluationResult::default_deny(NO_POLICY_MATCH),
                trace: Vec::new(),
            });
        }

        sort_by_priority(&mut candidates);

        let conditions = ConditionEvaluator::new(ctx);
        let mut trace = Vec::with_capacity(candidates.len());

        for policy in &candidates {
            let outcome = scan_policy(policy, ctx, &conditions);
            let matched = outcome == PolicyOutcome::Matched;
            trace.push(PolicyTrace {
                policy_id: policy.id().clone(),
                name: policy.name().to_string(),
                priority: policy.priority(),
                outcome,
            });

            if matched {
                debug!(
                    "ABAC: policy {} ({}) matched {} on {} with effect {}",
                    policy.name(),
                    policy.id(),
                    ctx.action,
                    ctx.resource,
                    policy.effect()
                );
                return Ok(AbacOutcome {
                    result: EvaluationResult::from_rule(
                        policy.effect(),
                        format!("policy {} matched", policy.name()),
                        MatchedRule::Policy {
                            policy_id: policy.id().clone(),
                        },
                    ),
                    trace,
                });
            }
        }

        Ok(AbacOutcome {
            result: EvaluationResult::default_deny(NO_POLICY_MATCH),
            trace,
        })
    }
}

fn scan_policy(
    policy: &Policy,
    ctx: &EvaluationContext,
    evaluator: &ConditionEvaluator<'_>,
) -> PolicyOutcome {
    if !policy.matches(&ctx.resource, &ctx.action) {
        let reason = if policy.is_active() {
            SkipReason::OtherTarget
        } else {
            SkipReason::Inactive
        };
        return PolicyOutcome::Skipped(reason);
    }

    let conditions = match policy.conditions() {
        Ok(conditions) => conditions,
        Err(e) => {
            warn!(
                "ABAC: skipping policy {} ({}): malformed conditions: {}",
                policy.name(),
                policy.id(),
                e
            );
            return PolicyOutcome::Skipped(SkipReason::MalformedConditions(e));
        }
    };

    match evaluator.first_failure(&conditions) {
        None => PolicyOutcome::Matched,
        Some(failure) => PolicyOutcome::NotMatched(failure),
    }
}
