//! Test utilities for replication integration tests

use async_trait::async_trait;
use banmesh_core::{ActorId, NodeId, SubjectId, SyncSettings};
use banmesh_sync::{
    InMemoryGateway, Node, NodeRegistry, Notifier, NotifyError, Operator, Report, SyncService,
};
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per process
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("banmesh_sync=debug")
            .try_init();
    });
}

/// Notifier that keeps every published report
#[derive(Default)]
pub struct CollectingNotifier {
    published: Mutex<Vec<(NodeId, Report)>>,
}

impl CollectingNotifier {
    /// Reports delivered so far, with their target node
    pub fn published(&self) -> Vec<(NodeId, Report)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn publish(&self, node: &Node, report: &Report) -> Result<(), NotifyError> {
        self.published
            .lock()
            .unwrap()
            .push((node.id.clone(), report.clone()));
        Ok(())
    }
}

/// A service over in-memory nodes named by `ids`
pub struct Mesh {
    pub gateway: Arc<InMemoryGateway>,
    pub notifier: Arc<CollectingNotifier>,
    pub service: SyncService,
}

impl Mesh {
    /// Build with zero inter-write delay
    pub fn new(ids: &[&str]) -> Self {
        Self::with_settings(
            ids,
            SyncSettings {
                inter_write_delay_ms: 0,
                ..SyncSettings::default()
            },
        )
    }

    /// Build with custom settings
    pub fn with_settings(ids: &[&str], settings: SyncSettings) -> Self {
        init_tracing();
        let registry = NodeRegistry::new(
            ids.iter()
                .map(|id| Node {
                    id: NodeId::new(*id),
                    display_name: id.to_string(),
                    log_sink: Some(format!("{id}-mod-log")),
                })
                .collect(),
        )
        .unwrap();
        let gateway = Arc::new(InMemoryGateway::with_nodes(ids.iter().copied()));
        let notifier = Arc::new(CollectingNotifier::default());
        let service = SyncService::new(
            Arc::new(registry),
            gateway.clone(),
            notifier.clone(),
            &settings,
        );
        Self {
            gateway,
            notifier,
            service,
        }
    }

    /// Whether `subject` is banned on `node`
    pub fn banned(&self, node: &str, subject: &str) -> bool {
        self.gateway
            .is_banned(&NodeId::new(node), &SubjectId::new(subject))
    }
}

/// An operator with ban authority on `node`
pub fn moderator(node: &str) -> Operator {
    Operator {
        actor: ActorId::new("mod-1"),
        node: NodeId::new(node),
        has_ban_authority: true,
    }
}
