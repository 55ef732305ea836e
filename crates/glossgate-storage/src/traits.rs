use std::future::Future;

use glossgate_core::{
    Actor, ActorId, CompositeId, DefaultFor, Grant, GrantId, GrantQuery, GrantScope, OrganizationId,
    PermissionTemplate, SessionId, SubjectRef, TemplateId, VisibilityState,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Duplicate(String),
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Read side of the permission model.
pub trait PermissionStore: Send + Sync {
    fn actor_for_session(
        &self,
        session: SessionId,
    ) -> impl Future<Output = Result<Option<Actor>, StorageError>> + Send;

    fn actor_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Grant>, StorageError>> + Send;

    fn organization_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Grant>, StorageError>> + Send;

    fn subject_grants(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> impl Future<Output = Result<Vec<Grant>, StorageError>> + Send;

    fn grant_exists_for_actor(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn grant_exists_for_organizations(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn visibility(
        &self,
        id: CompositeId,
    ) -> impl Future<Output = Result<Option<VisibilityState>, StorageError>> + Send;
}

/// Creates model rows. Grants are instantiated and attached, never removed.
pub trait PermissionWriter: Send + Sync {
    /// New accounts are active and not superusers.
    fn create_actor(&self) -> impl Future<Output = Result<Actor, StorageError>> + Send;

    fn set_actor_active(
        &self,
        actor: ActorId,
        active: bool,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn set_actor_superuser(
        &self,
        actor: ActorId,
        superuser: bool,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn open_session(
        &self,
        actor: ActorId,
    ) -> impl Future<Output = Result<SessionId, StorageError>> + Send;

    fn create_organization(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<OrganizationId, StorageError>> + Send;

    /// Adding an existing member is a no-op.
    fn add_organization_member(
        &self,
        organization: OrganizationId,
        actor: ActorId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Fails with `Duplicate` when the (subject, action) pair already has a template.
    fn create_template(
        &self,
        subject: &str,
        action: &str,
        defaults: &[DefaultFor],
    ) -> impl Future<Output = Result<PermissionTemplate, StorageError>> + Send;

    fn default_templates(
        &self,
        kind: DefaultFor,
    ) -> impl Future<Output = Result<Vec<PermissionTemplate>, StorageError>> + Send;

    /// Fails with `Duplicate` when the template is already instantiated for the scope.
    fn create_grant(
        &self,
        template: TemplateId,
        scope: GrantScope,
    ) -> impl Future<Output = Result<Grant, StorageError>> + Send;

    /// Attaches every default template of `kind`, instantiated for `id`, to
    /// `owner` in one atomic step. A grant that already exists for the scope
    /// is reused, so repeating the call is harmless.
    fn provision_defaults(
        &self,
        kind: DefaultFor,
        id: CompositeId,
        owner: ActorId,
    ) -> impl Future<Output = Result<Vec<Grant>, StorageError>> + Send;

    fn assign_grant_to_actor(
        &self,
        grant: GrantId,
        actor: ActorId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn assign_grant_to_organization(
        &self,
        grant: GrantId,
        organization: OrganizationId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn set_visibility(
        &self,
        id: CompositeId,
        state: VisibilityState,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
