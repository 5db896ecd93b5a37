//! End-to-end replication scenarios
//!
//! # Test Scenarios
//!
//! 1. **Three-node fan-out**: ban at A reaches B and C
//! 2. **Unreachable target**: B down, C still banned
//! 3. **Idempotent replay**: second propagation writes nothing
//! 4. **Mixed reconciliation**: tagged copy never becomes the origin
//! 5. **Partial retraction**: node without the ban reports `WasNotBanned`

use banmesh_core::{NodeId, SubjectId};
use banmesh_sync::{
    BanEvent, OperatorCommand, PropagationOutcome, ReportScope, SyncError, SyncTag,
};

use crate::test_utils::{moderator, Mesh};

fn ban_at(node: &str, subject: &str, reason: &str) -> BanEvent {
    BanEvent {
        node: NodeId::new(node),
        subject: SubjectId::new(subject),
        reason: Some(reason.to_string()),
    }
}

#[tokio::test]
async fn test_three_node_fan_out() {
    let mesh = Mesh::new(&["A", "B", "C"]);
    mesh.gateway
        .seed_ban(&NodeId::new("A"), &SubjectId::new("U1"), "spam");

    let report = mesh
        .service
        .handle_ban_event(ban_at("A", "U1", "spam"))
        .await
        .unwrap()
        .unwrap();

    let outcomes: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| (o.node.as_str(), o.outcome.clone()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("A", PropagationOutcome::Skipped { origin: NodeId::new("A") }),
            ("B", PropagationOutcome::Applied),
            ("C", PropagationOutcome::Applied),
        ]
    );
    assert_eq!(report.tally.applied_count, 2);
    assert_eq!(report.tally.error_count, 0);
    assert!(mesh.banned("B", "U1"));
    assert!(mesh.banned("C", "U1"));

    // Published to every node's sink.
    let published = mesh.notifier.published();
    assert_eq!(published.len(), 3);
    assert!(published.iter().all(|(_, r)| r.run_id == report.run_id));
}

#[tokio::test]
async fn test_unreachable_target() {
    let mesh = Mesh::new(&["A", "B", "C"]);
    mesh.gateway.set_reachable(&NodeId::new("B"), false);

    let report = mesh
        .service
        .handle_ban_event(ban_at("A", "U1", "spam"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.outcomes[1].outcome, PropagationOutcome::NodeUnreachable);
    assert_eq!(report.outcomes[2].outcome, PropagationOutcome::Applied);
    assert_eq!(report.tally.applied_count, 1);
    assert_eq!(report.tally.unreachable_count, 1);
    assert!(!mesh.banned("B", "U1"));
}

#[tokio::test]
async fn test_idempotent_replay() {
    let mesh = Mesh::new(&["A", "B", "C", "D"]);
    mesh.gateway.set_permission(&NodeId::new("D"), false);

    let first = mesh
        .service
        .handle_ban_event(ban_at("A", "U1", "spam"))
        .await
        .unwrap()
        .unwrap();
    let writes = mesh.gateway.write_count();
    let second = mesh
        .service
        .handle_ban_event(ban_at("A", "U1", "spam"))
        .await
        .unwrap()
        .unwrap();

    for (a, b) in first.outcomes.iter().zip(&second.outcomes) {
        if a.outcome == PropagationOutcome::Applied {
            assert_eq!(b.outcome, PropagationOutcome::AlreadyPresent, "node {}", b.node);
        }
    }
    assert_eq!(second.outcomes[3].outcome, PropagationOutcome::PermissionDenied);
    assert_eq!(mesh.gateway.write_count(), writes);
}

#[tokio::test]
async fn test_reconciliation_with_tagged_duplicate() {
    let mesh = Mesh::new(&["A", "B", "C"]);
    let tag = SyncTag::default();
    let u1 = SubjectId::new("U1");
    mesh.gateway
        .seed_ban(&NodeId::new("A"), &u1, &tag.tag("B", "spam"));
    mesh.gateway.seed_ban(&NodeId::new("B"), &u1, "spam");

    let report = mesh
        .service
        .execute(&moderator("A"), OperatorCommand::Sync)
        .await
        .unwrap();

    assert_eq!(report.scope, ReportScope::Reconciliation { subjects: 1 });
    let outcomes: Vec<_> = report.outcomes.iter().map(|o| o.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            PropagationOutcome::AlreadyPresent,
            PropagationOutcome::Skipped { origin: NodeId::new("B") },
            PropagationOutcome::Applied,
        ]
    );
    assert_eq!(
        mesh.gateway.ban_reason(&NodeId::new("C"), &u1).as_deref(),
        Some("[BanSync] from B: spam")
    );

    // Only the invoking node receives the reconciliation report.
    let published = mesh.notifier.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, NodeId::new("A"));
}

#[tokio::test]
async fn test_partial_retraction() {
    let mesh = Mesh::new(&["A", "B", "C"]);
    let u1 = SubjectId::new("U1");
    mesh.gateway.seed_ban(&NodeId::new("A"), &u1, "spam");
    mesh.gateway
        .seed_ban(&NodeId::new("B"), &u1, "[BanSync] from A: spam");

    let report = mesh
        .service
        .execute(
            &moderator("A"),
            OperatorCommand::Unban {
                subject_id: u1.clone(),
                reason: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes[2].outcome, PropagationOutcome::WasNotBanned);
    assert_eq!(report.tally.applied_count, 2);
    assert_eq!(report.tally.already_count, 1);
    assert_eq!(report.tally.error_count, 0);
    assert!(!mesh.banned("A", "U1"));
    assert!(!mesh.banned("B", "U1"));
}

#[tokio::test]
async fn test_unauthorised_operator_touches_nothing() {
    let mesh = Mesh::new(&["A", "B"]);
    mesh.gateway
        .seed_ban(&NodeId::new("A"), &SubjectId::new("U1"), "spam");
    let mut operator = moderator("A");
    operator.has_ban_authority = false;

    let result = mesh
        .service
        .execute(
            &operator,
            OperatorCommand::Unban {
                subject_id: SubjectId::new("U1"),
                reason: None,
            },
        )
        .await;

    assert!(matches!(result, Err(SyncError::Unauthorized { .. })));
    assert!(mesh.banned("A", "U1"));
    assert!(mesh.notifier.published().is_empty());
}

#[tokio::test]
async fn test_report_wire_shape() {
    let mesh = Mesh::new(&["A", "B"]);
    mesh.gateway.set_reachable(&NodeId::new("B"), false);

    let report = mesh
        .service
        .handle_ban_event(ban_at("A", "U1", "spam"))
        .await
        .unwrap()
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["scope"]["type"], "ban");
    assert_eq!(json["skipped_count"], 1);
    assert_eq!(json["unreachable_count"], 1);
    assert_eq!(json["outcomes"][1]["kind"], "node_unreachable");
    assert_eq!(json["outcomes"][1]["subject"], "U1");
}
