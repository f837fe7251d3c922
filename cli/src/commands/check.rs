use anyhow::{anyhow, bail, Result};
use authz::{ActionType, AttributeValue, Attributes, Explanation, ResourceType, UserId};
use clap::Args;
use colored::*;
use serde_json::json;

use super::{load_store, permission_service};
use crate::utils::env_paths::EnvPaths;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// User to evaluate
    pub user: String,

    /// Resource type (e.g., task, project)
    pub resource: ResourceType,

    /// Action (e.g., read, update)
    pub action: ActionType,

    /// Resource attribute, repeatable (e.g., --attr owner_id=alice)
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,

    /// Environment attribute, repeatable (e.g., --env ip=10.0.0.1)
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Show both sub-decisions and every policy scanned
    #[arg(long)]
    pub explain: bool,

    /// Output format (json, text)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

/// Evaluates one request. Returns whether access was allowed.
pub async fn execute(paths: &EnvPaths, args: CheckArgs) -> Result<bool> {
    let resource_ctx = parse_attributes(&args.attrs)?;
    let environment = parse_attributes(&args.env)?;

    let store = load_store(paths).await?;
    let service = permission_service(&store);
    let user_id = UserId::from(args.user.as_str());

    let explanation = service
        .explain_access(
            &user_id,
            args.resource.clone(),
            args.action.clone(),
            resource_ctx,
            environment,
        )
        .await?;

    match args.format.as_str() {
        "json" => print_json(&args, &explanation)?,
        _ => print_text(&args, &explanation),
    }

    Ok(explanation.result.allowed)
}

fn print_json(args: &CheckArgs, explanation: &Explanation) -> Result<()> {
    let result = &explanation.result;
    let mut output = json!({
        "user": args.user,
        "resource": args.resource.as_str(),
        "action": args.action.as_str(),
        "allowed": result.allowed,
        "effect": result.effect,
        "reason": result.reason,
        "matched_rule": result.matched_rule.as_ref().map(|rule| rule.to_string()),
    });

    if args.explain {
        output["rbac"] = serde_json::to_value(&explanation.rbac)?;
        output["abac"] = serde_json::to_value(&explanation.abac)?;
        output["policies"] = explanation
            .policy_trace
            .iter()
            .map(|trace| {
                json!({
                    "id": trace.policy_id.as_str(),
                    "name": trace.name,
                    "priority": trace.priority,
                    "outcome": trace.outcome.to_string(),
                })
            })
            .collect();
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(args: &CheckArgs, explanation: &Explanation) {
    let result = &explanation.result;
    let verdict = if result.allowed {
        "ALLOW".green().bold()
    } else {
        "DENY".red().bold()
    };
    println!("{} {} {} {}", verdict, args.user, args.action, args.resource);
    println!("  {} {}", "reason:".bright_black(), result.reason);
    if let Some(rule) = &result.matched_rule {
        println!("  {} {}", "rule:".bright_black(), rule);
    }

    if args.explain {
        println!(
            "  {} {} ({})",
            "rbac:".bright_black(),
            explanation.rbac.effect,
            explanation.rbac.reason
        );
        println!(
            "  {} {} ({})",
            "abac:".bright_black(),
            explanation.abac.effect,
            explanation.abac.reason
        );
        if explanation.policy_trace.is_empty() {
            println!("  {}", "no policies target this resource and action".yellow());
        }
        for trace in &explanation.policy_trace {
            println!(
                "    [{}] {}: {}",
                trace.priority,
                trace.name.cyan(),
                trace.outcome
            );
        }
    }
}

pub fn parse_attributes(raw: &[String]) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for entry in raw {
        let (key, value) = parse_attribute(entry)?;
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// Parses `KEY=VALUE`. The value is read as a bool, then an integer, then a
/// finite float, and otherwise kept as a string.
pub fn parse_attribute(raw: &str) -> Result<(String, AttributeValue)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Attribute key cannot be empty in '{}'", raw);
    }
    Ok((key.to_string(), parse_value(value)))
}

fn parse_value(raw: &str) -> AttributeValue {
    if let Ok(flag) = raw.parse::<bool>() {
        return AttributeValue::Bool(flag);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return AttributeValue::Int(int);
    }
    match raw.parse::<f64>() {
        Ok(float) if float.is_finite() => AttributeValue::Float(float),
        _ => AttributeValue::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_precedence() {
        assert_eq!(parse_value("true"), AttributeValue::Bool(true));
        assert_eq!(parse_value("42"), AttributeValue::Int(42));
        assert_eq!(parse_value("-7"), AttributeValue::Int(-7));
        assert_eq!(parse_value("0.5"), AttributeValue::Float(0.5));
        assert_eq!(parse_value("inf"), AttributeValue::String("inf".into()));
        assert_eq!(parse_value("alice"), AttributeValue::String("alice".into()));
        assert_eq!(parse_value(""), AttributeValue::String(String::new()));
    }

    #[test]
    fn test_parse_attribute() {
        let (key, value) = parse_attribute("owner_id=alice").unwrap();
        assert_eq!(key, "owner_id");
        assert_eq!(value, AttributeValue::String("alice".into()));

        // Only the first '=' separates key and value
        let (key, value) = parse_attribute("query=a=b").unwrap();
        assert_eq!(key, "query");
        assert_eq!(value, AttributeValue::String("a=b".into()));

        assert!(parse_attribute("no-separator").is_err());
        assert!(parse_attribute("=value").is_err());
    }

    #[test]
    fn test_later_attributes_overwrite_earlier_ones() {
        let attributes =
            parse_attributes(&["status=open".to_string(), "status=archived".to_string()])
                .unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(
            attributes["status"],
            AttributeValue::String("archived".into())
        );
    }
}
