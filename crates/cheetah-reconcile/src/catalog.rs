//! Object catalog access.

use cheetah_bfrt::{BfrtSession, DataplaneObject, ObjectKind};
use log::debug;
use std::sync::Arc;

use crate::error::{ReconcileError, Result};

/// Read-only view of the objects a pipeline currently exposes.
///
/// The catalog is queried live on every call; nothing is cached.
#[derive(Clone)]
pub struct Catalog {
    session: Arc<dyn BfrtSession>,
}

impl Catalog {
    pub fn new(session: Arc<dyn BfrtSession>) -> Self {
        Self { session }
    }

    /// Returns the objects whose kind is in `kinds`, in catalog order.
    ///
    /// An empty result is not an error. Any session failure is fatal and
    /// no partial list is returned.
    pub async fn list_objects(&self, kinds: &[ObjectKind]) -> Result<Vec<DataplaneObject>> {
        let selected: Vec<DataplaneObject> = self
            .fetch()
            .await?
            .into_iter()
            .filter(|o| kinds.contains(&o.kind))
            .collect();
        debug!(
            "catalog of {}: {} objects of kinds {:?}",
            self.session.program(),
            selected.len(),
            kinds
        );
        Ok(selected)
    }

    /// Looks up one object by name or qualified name, whatever its kind.
    pub async fn find(&self, name: &str) -> Result<Option<DataplaneObject>> {
        Ok(self
            .fetch()
            .await?
            .into_iter()
            .find(|o| o.name == name || o.full_name == name))
    }

    async fn fetch(&self) -> Result<Vec<DataplaneObject>> {
        self.session.objects().await.map_err(|source| {
            if source.is_transport() {
                ReconcileError::transport("<catalog>", source)
            } else {
                ReconcileError::Catalog { source }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cheetah_bfrt::{SimSession, SimSnapshot};
    use pretty_assertions::assert_eq;

    fn session() -> Arc<SimSession> {
        Arc::new(SimSession::new(
            SimSnapshot::new("cheetah")
                .table("pipe.Ingress.get_client", ObjectKind::MatchDirect)
                .table("pipe.Ingress.lb_sel", ObjectKind::Selector)
                .register("pipe.Ingress.bucket_counter_reg", 1, &["f1"]),
        ))
    }

    #[tokio::test]
    async fn test_filter_by_kind() {
        let catalog = Catalog::new(session());
        let names: Vec<String> = catalog
            .list_objects(&[ObjectKind::MatchDirect, ObjectKind::MatchIndirectSelector])
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["pipe.Ingress.get_client".to_string()]);
    }

    #[tokio::test]
    async fn test_no_matching_kind_is_empty() {
        let catalog = Catalog::new(session());
        let objects = catalog
            .list_objects(&[ObjectKind::ActionProfile])
            .await
            .unwrap();
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_find_register() {
        let catalog = Catalog::new(session());
        let reg = catalog
            .find("pipe.Ingress.bucket_counter_reg")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reg.kind, ObjectKind::Register);
        assert!(catalog.find("pipe.Ingress.nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let sim = session();
        sim.disconnect();
        let catalog = Catalog::new(sim);
        let err = catalog
            .list_objects(&[ObjectKind::MatchDirect])
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Transport { .. }));
    }
}
