//! Loop-freedom tests
//!
//! Every write the system makes comes back as a new ban event. These tests
//! feed those echoes back in and check that none of them propagates again.

use async_trait::async_trait;
use banmesh_core::{NodeId, SubjectId};
use banmesh_sync::{
    Admission, BanEvent, BanRecord, CancelSignal, EventGuard, FixedDelayGate, GatewayError,
    InMemoryGateway, LeaseStore, Node, NodeGateway, NodeRegistry, ProcessingLock,
    PropagationEngine, PropagationOutcome, SyncTag,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::test_utils::Mesh;

#[tokio::test]
async fn test_echoes_do_not_propagate() {
    let mesh = Mesh::new(&["A", "B", "C"]);
    let mut echoes = mesh.gateway.subscribe_echo();
    let subject = SubjectId::new("U1");
    mesh.gateway.seed_ban(&NodeId::new("A"), &subject, "spam");

    let report = mesh
        .service
        .handle_ban_event(BanEvent {
            node: NodeId::new("A"),
            subject: subject.clone(),
            reason: Some("spam".into()),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.tally.applied_count, 2);

    let mut replayed = 0;
    while let Ok(echo) = echoes.try_recv() {
        let result = mesh.service.handle_ban_event(echo).await.unwrap();
        assert!(result.is_none(), "echo was propagated again");
        replayed += 1;
    }

    assert_eq!(replayed, 2);
    assert_eq!(mesh.gateway.write_count(), 2);
    assert!(echoes.try_recv().is_err());
}

#[tokio::test]
async fn test_echo_without_reason_is_looked_up_and_ignored() {
    let mesh = Mesh::new(&["A", "B"]);
    let mut echoes = mesh.gateway.subscribe_echo();
    mesh.gateway
        .seed_ban(&NodeId::new("A"), &SubjectId::new("U1"), "spam");

    mesh.service
        .handle_ban_event(BanEvent {
            node: NodeId::new("A"),
            subject: SubjectId::new("U1"),
            reason: None,
        })
        .await
        .unwrap()
        .unwrap();

    // Platforms may drop the reason; the stored one still carries the tag.
    let mut echo = echoes.try_recv().unwrap();
    echo.reason = None;
    assert!(mesh.service.handle_ban_event(echo).await.unwrap().is_none());
    assert_eq!(mesh.gateway.write_count(), 1);
}

/// Gateway that checks its own echo against the guard while the write is in flight
struct InFlightProbe {
    inner: InMemoryGateway,
    guard: EventGuard,
    verdicts: Mutex<Vec<Admission>>,
}

#[async_trait]
impl NodeGateway for InFlightProbe {
    async fn is_reachable(&self, node: &NodeId) -> bool {
        self.inner.is_reachable(node).await
    }

    async fn has_ban_permission(&self, node: &NodeId) -> bool {
        self.inner.has_ban_permission(node).await
    }

    async fn get_ban_record(
        &self,
        node: &NodeId,
        subject: &SubjectId,
    ) -> Result<Option<BanRecord>, GatewayError> {
        self.inner.get_ban_record(node, subject).await
    }

    async fn list_ban_records(&self, node: &NodeId) -> Result<Vec<BanRecord>, GatewayError> {
        self.inner.list_ban_records(node).await
    }

    async fn apply_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.inner.apply_ban(node, subject, reason).await?;
        // An untagged echo, as if the platform had rewritten the reason.
        let verdict = self.guard.admit(&BanEvent {
            node: node.clone(),
            subject: subject.clone(),
            reason: Some("spam".into()),
        });
        self.verdicts.lock().unwrap().push(verdict);
        Ok(())
    }

    async fn remove_ban(
        &self,
        node: &NodeId,
        subject: &SubjectId,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.inner.remove_ban(node, subject, reason).await
    }

    async fn is_member(&self, node: &NodeId, subject: &SubjectId) -> Result<bool, GatewayError> {
        self.inner.is_member(node, subject).await
    }
}

#[tokio::test]
async fn test_echo_during_write_caught_by_lock() {
    let ids = ["A", "B", "C"];
    let registry = NodeRegistry::new(
        ids.iter()
            .map(|id| Node {
                id: NodeId::new(*id),
                display_name: id.to_string(),
                log_sink: None,
            })
            .collect(),
    )
    .unwrap();
    let lock: Arc<dyn LeaseStore> = Arc::new(ProcessingLock::new());
    let probe = Arc::new(InFlightProbe {
        inner: InMemoryGateway::with_nodes(ids),
        guard: EventGuard::new(lock.clone(), SyncTag::default()),
        verdicts: Mutex::new(Vec::new()),
    });
    let engine = PropagationEngine::new(
        Arc::new(registry),
        probe.clone(),
        lock.clone(),
        Arc::new(FixedDelayGate::new(Duration::ZERO)),
        SyncTag::default(),
    );

    let outcomes = engine
        .propagate(
            &SubjectId::new("U1"),
            &NodeId::new("A"),
            "spam",
            &CancelSignal::never(),
        )
        .await
        .unwrap();

    assert_eq!(
        outcomes
            .iter()
            .filter(|o| o.outcome == PropagationOutcome::Applied)
            .count(),
        2
    );
    assert_eq!(
        *probe.verdicts.lock().unwrap(),
        vec![Admission::EchoInFlight, Admission::EchoInFlight]
    );
    // Tokens are released once each write returns.
    assert!(!lock.is_held(&SubjectId::new("U1"), &NodeId::new("B")));
}
