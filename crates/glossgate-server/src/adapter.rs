use std::sync::Arc;

use glossgate_core::engine::{CheckError, PermissionReader};
use glossgate_core::{
    Actor, ActorId, CompositeId, Grant, GrantQuery, SessionId, SubjectRef, VisibilityState,
};
use glossgate_storage::{PermissionStore, StorageError};

/// Exposes a storage backend to the evaluators.
pub struct StorePermissionReader<S: PermissionStore> {
    store: Arc<S>,
}

impl<S: PermissionStore> StorePermissionReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

fn to_check_error(e: StorageError) -> CheckError {
    CheckError::StorageError(e.to_string())
}

impl<S: PermissionStore> PermissionReader for StorePermissionReader<S> {
    async fn actor_for_session(&self, session: SessionId) -> Result<Option<Actor>, CheckError> {
        self.store
            .actor_for_session(session)
            .await
            .map_err(to_check_error)
    }

    async fn actor_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> Result<Vec<Grant>, CheckError> {
        self.store
            .actor_grants(actor, subject)
            .await
            .map_err(to_check_error)
    }

    async fn organization_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> Result<Vec<Grant>, CheckError> {
        self.store
            .organization_grants(actor, subject)
            .await
            .map_err(to_check_error)
    }

    async fn subject_grants(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> Result<Vec<Grant>, CheckError> {
        self.store
            .subject_grants(subject, target)
            .await
            .map_err(to_check_error)
    }

    async fn grant_exists_for_actor(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> Result<bool, CheckError> {
        self.store
            .grant_exists_for_actor(query, actor)
            .await
            .map_err(to_check_error)
    }

    async fn grant_exists_for_organizations(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> Result<bool, CheckError> {
        self.store
            .grant_exists_for_organizations(query, actor)
            .await
            .map_err(to_check_error)
    }

    async fn visibility(&self, id: CompositeId) -> Result<Option<VisibilityState>, CheckError> {
        self.store.visibility(id).await.map_err(to_check_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossgate_core::GrantScope;
    use glossgate_storage::{InMemoryStore, PermissionWriter};

    #[tokio::test]
    async fn adapter_reads_grants_from_store() {
        let store = Arc::new(InMemoryStore::new());
        let actor = store.create_actor().await.unwrap();
        let template = store
            .create_template("perspective", "view", &[])
            .await
            .unwrap();
        let grant = store
            .create_grant(template.id, GrantScope::Object(3))
            .await
            .unwrap();
        store
            .assign_grant_to_actor(grant.id, actor.id)
            .await
            .unwrap();

        let adapter = StorePermissionReader::new(Arc::clone(&store));
        let grants = adapter
            .actor_grants(actor.id, Some("perspective"))
            .await
            .unwrap();

        assert_eq!(grants, vec![grant]);
    }

    #[tokio::test]
    async fn adapter_resolves_sessions() {
        let store = Arc::new(InMemoryStore::new());
        let actor = store.create_actor().await.unwrap();
        let session = store.open_session(actor.id).await.unwrap();

        let adapter = StorePermissionReader::new(Arc::clone(&store));

        assert_eq!(
            adapter.actor_for_session(session).await.unwrap(),
            Some(actor)
        );
    }

    #[test]
    fn storage_errors_become_check_errors() {
        let err = to_check_error(StorageError::Internal("connection reset".to_string()));

        assert!(
            matches!(err, CheckError::StorageError(ref msg) if msg.contains("connection reset")),
            "expected StorageError with 'connection reset', got: {err}"
        );
    }
}
