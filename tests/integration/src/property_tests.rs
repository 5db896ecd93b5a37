//! Property tests over randomly shaped meshes

use banmesh_core::{NodeId, SubjectId};
use banmesh_sync::{BanEvent, OutcomeBucket, PropagationOutcome};
use proptest::prelude::*;

use crate::test_utils::Mesh;

#[derive(Debug, Clone, Copy)]
enum NodeShape {
    Healthy,
    Down,
    NoPermission,
    AlreadyBanned,
    Failing,
}

fn node_shape() -> impl Strategy<Value = NodeShape> {
    prop_oneof![
        4 => Just(NodeShape::Healthy),
        1 => Just(NodeShape::Down),
        1 => Just(NodeShape::NoPermission),
        1 => Just(NodeShape::AlreadyBanned),
        1 => Just(NodeShape::Failing),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_origin_never_written_and_tally_covers_every_node(
        shapes in prop::collection::vec(node_shape(), 2..8),
        origin_pick in any::<prop::sample::Index>(),
    ) {
        let ids: Vec<String> = (0..shapes.len()).map(|i| format!("n{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let mesh = Mesh::new(&id_refs);
        let subject = SubjectId::new("U1");
        let origin_index = origin_pick.index(ids.len());
        let origin = NodeId::new(ids[origin_index].as_str());

        for (id, shape) in ids.iter().zip(&shapes) {
            let node = NodeId::new(id.as_str());
            match shape {
                NodeShape::Healthy => {}
                NodeShape::Down => mesh.gateway.set_reachable(&node, false),
                NodeShape::NoPermission => mesh.gateway.set_permission(&node, false),
                NodeShape::AlreadyBanned => mesh.gateway.seed_ban(&node, &subject, "earlier"),
                NodeShape::Failing => mesh.gateway.fail_writes(&node, "rate limited"),
            }
        }

        let report = runtime()
            .block_on(mesh.service.handle_ban_event(BanEvent {
                node: origin.clone(),
                subject: subject.clone(),
                reason: Some("spam".into()),
            }))
            .unwrap()
            .unwrap();

        prop_assert_eq!(report.outcomes.len(), ids.len());
        prop_assert_eq!(report.tally.total(), ids.len());

        let origin_outcome = &report.outcomes[origin_index];
        prop_assert_eq!(&origin_outcome.node, &origin);
        match shapes[origin_index] {
            NodeShape::Down => {
                prop_assert_eq!(&origin_outcome.outcome, &PropagationOutcome::NodeUnreachable)
            }
            _ => prop_assert_eq!(
                &origin_outcome.outcome,
                &PropagationOutcome::Skipped { origin: origin.clone() }
            ),
        }

        let applied = report
            .outcomes
            .iter()
            .filter(|o| o.outcome.bucket() == OutcomeBucket::Applied)
            .count();
        prop_assert_eq!(applied, report.tally.applied_count);
        prop_assert_eq!(applied, mesh.gateway.write_count());

        for (outcome, shape) in report.outcomes.iter().zip(&shapes) {
            if outcome.node == origin {
                continue;
            }
            let expected = match shape {
                NodeShape::Healthy => PropagationOutcome::Applied,
                NodeShape::Down => PropagationOutcome::NodeUnreachable,
                NodeShape::NoPermission => PropagationOutcome::PermissionDenied,
                NodeShape::AlreadyBanned => PropagationOutcome::AlreadyPresent,
                NodeShape::Failing => PropagationOutcome::Failed {
                    reason: "Remote error: rate limited".into(),
                },
            };
            prop_assert_eq!(&outcome.outcome, &expected, "node {}", outcome.node);
        }
    }
}
