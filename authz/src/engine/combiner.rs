use crate::context::EvaluationResult;
use crate::types::Effect;

/// Merges the two sub-decisions.
///
/// Precedence, highest first: an explicit policy deny, an explicit policy
/// allow, then whatever RBAC decided (a role grant or the implicit deny).
pub fn combine(rbac: &EvaluationResult, abac: &EvaluationResult) -> EvaluationResult {
    match (abac.effect, abac.is_explicit()) {
        (Effect::Deny, true) => abac.clone(),
        (Effect::Allow, true) => abac.clone(),
        _ => rbac.clone(),
    }
}
