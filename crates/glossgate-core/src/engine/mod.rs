mod check;
mod direct;
#[cfg(test)]
mod equivalence;
mod principals;

pub use check::CheckEngine;
pub use direct::DirectEngine;
pub use principals::{PrincipalResolution, PrincipalResolver, PrincipalSet};

use std::future::Future;

use crate::model::{Actor, ActorId, CompositeId, Grant, SessionId, SubjectRef, VisibilityState};
use crate::policy::GrantQuery;

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// A subject reference that is neither a single id, a pair, nor absent.
    #[error("unrecognized subject reference: {0}")]
    UnrecognizedSubjectRef(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub session: Option<SessionId>,
    pub action: String,
    pub subject: String,
    pub target: SubjectRef,
}

impl CheckRequest {
    pub fn new(
        session: Option<SessionId>,
        action: impl Into<String>,
        subject: impl Into<String>,
        target: SubjectRef,
    ) -> Self {
        Self {
            session,
            action: action.into(),
            subject: subject.into(),
            target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    pub allowed: bool,
}

/// Read access to the permission model.
pub trait PermissionReader: Send + Sync {
    fn actor_for_session(
        &self,
        session: SessionId,
    ) -> impl Future<Output = Result<Option<Actor>, CheckError>> + Send;

    /// Grants held directly by the actor, optionally restricted to one subject type.
    fn actor_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Grant>, CheckError>> + Send;

    /// Grants held by any organization the actor belongs to.
    fn organization_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Grant>, CheckError>> + Send;

    /// Every grant of the subject type whose scope covers the target.
    fn subject_grants(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> impl Future<Output = Result<Vec<Grant>, CheckError>> + Send;

    fn grant_exists_for_actor(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> impl Future<Output = Result<bool, CheckError>> + Send;

    fn grant_exists_for_organizations(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> impl Future<Output = Result<bool, CheckError>> + Send;

    fn visibility(
        &self,
        id: CompositeId,
    ) -> impl Future<Output = Result<Option<VisibilityState>, CheckError>> + Send;
}
