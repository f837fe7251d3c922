//! End-to-end access decisions through the public API: a YAML seed, the
//! in-memory store, and the permission service.

use std::sync::Arc;

use authz::{
    ActionType, AttributeValue, Attributes, CatalogService, ErrorKind, InMemoryStore,
    MatchedRule, PermissionService, PolicyOutcome, ResourceType, RoleId, Seed, SkipReason,
    UserId,
};

const SEED: &str = r#"
defaults: true
roles:
  - id: reviewer
    name: reviewer
    permissions: [task:read, task:approve]
policies:
  - id: deny-archived
    name: deny-archived
    resource: task
    action: update
    effect: deny
    priority: 100
    conditions:
      status: archived
  - id: owner-delete
    name: owner-delete
    resource: task
    action: delete
    effect: allow
    priority: 10
    conditions:
      user_id: "${resource.owner_id}"
  - id: broken
    name: broken
    resource: file
    action: delete
    effect: allow
    priority: 50
    conditions: [not, an, object]
  - id: any-file-delete
    name: any-file-delete
    resource: file
    action: delete
    effect: deny
    priority: 1
user_roles:
  alice: [manager]
  bob: [member]
  carol: [member, reviewer]
"#;

async fn setup() -> (Arc<InMemoryStore>, PermissionService) {
    let store = Arc::new(InMemoryStore::new());
    Seed::from_yaml(SEED)
        .unwrap()
        .install(store.as_ref())
        .await
        .unwrap();
    let service = PermissionService::new(store.clone(), store.clone(), store.clone());
    (store, service)
}

fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn test_deny_policy_overrides_role_grant() {
    let (_store, service) = setup().await;
    let alice = UserId::from("alice");

    let open = attrs(&[("status", "open".into())]);
    assert!(service
        .can_user_perform_action(&alice, ResourceType::TASK, ActionType::UPDATE, open)
        .await
        .unwrap());

    let archived = attrs(&[("status", "archived".into())]);
    let result = service
        .evaluate_access(
            &alice,
            ResourceType::TASK,
            ActionType::UPDATE,
            archived,
            Attributes::new(),
        )
        .await
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.reason, "policy deny-archived matched");
    assert_eq!(
        result.matched_rule,
        Some(MatchedRule::Policy {
            policy_id: "deny-archived".into()
        })
    );
}

#[tokio::test]
async fn test_environment_overwrites_resource_attributes() {
    let (_store, service) = setup().await;
    let alice = UserId::from("alice");

    let result = service
        .evaluate_access(
            &alice,
            ResourceType::TASK,
            ActionType::UPDATE,
            attrs(&[("status", "open".into())]),
            attrs(&[("status", "archived".into())]),
        )
        .await
        .unwrap();
    assert!(!result.allowed);
}

#[tokio::test]
async fn test_owner_variable_resolution() {
    let (_store, service) = setup().await;
    let bob = UserId::from("bob");

    let own = attrs(&[("owner_id", "bob".into())]);
    assert!(service
        .can_user_perform_action(&bob, ResourceType::TASK, ActionType::DELETE, own)
        .await
        .unwrap());

    let other = attrs(&[("owner_id", "alice".into())]);
    assert!(!service
        .can_user_perform_action(&bob, ResourceType::TASK, ActionType::DELETE, other)
        .await
        .unwrap());

    // Unresolvable reference never matches
    assert!(!service
        .can_user_perform_action(&bob, ResourceType::TASK, ActionType::DELETE, Attributes::new())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_malformed_policy_skipped_and_scan_continues() {
    let (_store, service) = setup().await;
    let explanation = service
        .explain_access(
            &UserId::from("alice"),
            ResourceType::FILE,
            ActionType::DELETE,
            Attributes::new(),
            Attributes::new(),
        )
        .await
        .unwrap();

    assert!(!explanation.result.allowed);
    assert_eq!(explanation.result.reason, "policy any-file-delete matched");
    assert_eq!(explanation.policy_trace.len(), 2);
    assert!(matches!(
        explanation.policy_trace[0].outcome,
        PolicyOutcome::Skipped(SkipReason::MalformedConditions(_))
    ));
    assert_eq!(explanation.policy_trace[1].outcome, PolicyOutcome::Matched);
}

#[tokio::test]
async fn test_role_order_and_permission_union() {
    let (_store, service) = setup().await;
    let carol = UserId::from("carol");

    let result = service
        .evaluate_access(
            &carol,
            ResourceType::TASK,
            ActionType::READ,
            Attributes::new(),
            Attributes::new(),
        )
        .await
        .unwrap();
    let roles = service.get_user_roles(&carol).await.unwrap();
    assert_eq!(roles[0].name(), "member");
    match result.matched_rule {
        Some(MatchedRule::RolePermission { role_id, .. }) => assert_eq!(&role_id, roles[0].id()),
        other => panic!("expected a role grant, got {:?}", other),
    }

    // task:read is held through both roles but listed once
    let permissions = service.get_user_permissions(&carol).await.unwrap();
    let task_read = permissions.iter().filter(|p| p.name() == "task:read").count();
    assert_eq!(task_read, 1);
    assert!(permissions.iter().any(|p| p.name() == "task:approve"));
}

#[tokio::test]
async fn test_assignment_changes_decisions() {
    let (_store, service) = setup().await;
    let dave = UserId::from("dave");
    let reviewer = RoleId::from("reviewer");

    assert!(!service
        .can_user_perform_action(&dave, ResourceType::TASK, ActionType::APPROVE, Attributes::new())
        .await
        .unwrap());

    service.assign_role_to_user(&dave, &reviewer).await.unwrap();
    assert!(service
        .can_user_perform_action(&dave, ResourceType::TASK, ActionType::APPROVE, Attributes::new())
        .await
        .unwrap());

    let err = service
        .assign_role_to_user(&dave, &reviewer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RoleAlreadyAssigned);

    service.revoke_role_from_user(&dave, &reviewer).await.unwrap();
    let err = service
        .require_permission(&dave, ResourceType::TASK, ActionType::APPROVE, Attributes::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn test_deactivated_policy_no_longer_applies() {
    let (store, service) = setup().await;
    let catalog = CatalogService::new(store.clone(), store.clone(), store.clone());
    let alice = UserId::from("alice");
    let archived = || attrs(&[("status", "archived".into())]);

    assert!(!service
        .can_user_perform_action(&alice, ResourceType::TASK, ActionType::UPDATE, archived())
        .await
        .unwrap());

    catalog
        .set_policy_active(&"deny-archived".into(), false)
        .await
        .unwrap();
    assert!(service
        .can_user_perform_action(&alice, ResourceType::TASK, ActionType::UPDATE, archived())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_concurrent_checks_share_one_service() {
    let (_store, service) = setup().await;
    let service = Arc::new(service);

    let handles: Vec<_> = ["alice", "bob", "carol", "nobody"]
        .into_iter()
        .map(|user| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .can_user_perform_action(
                        &UserId::from(user),
                        ResourceType::TASK,
                        ActionType::READ,
                        Attributes::new(),
                    )
                    .await
            })
        })
        .collect();

    let mut decisions = Vec::new();
    for handle in handles {
        decisions.push(handle.await.unwrap().unwrap());
    }
    assert_eq!(decisions, vec![true, true, true, false]);
}
