use std::sync::Arc;

use crate::model::{Actor, SubjectRef};
use crate::policy::{GrantQuery, Policy, is_visibility_action};

use super::{CheckError, CheckRequest, CheckResult, PermissionReader};

/// Answers a single request with existence queries instead of materializing
/// the caller's principal set.
pub struct DirectEngine<R: PermissionReader> {
    reader: Arc<R>,
    policy: Arc<Policy>,
}

impl<R: PermissionReader> DirectEngine<R> {
    pub fn new(reader: Arc<R>, policy: Arc<Policy>) -> Self {
        Self { reader, policy }
    }

    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResult, CheckError> {
        let actor = match request.session {
            Some(session) => self.reader.actor_for_session(session).await?,
            None => None,
        };

        let allowed = match actor {
            None => self.check_anonymous(request).await?,
            Some(actor) => self.check_actor(&actor, request).await?,
        };

        Ok(CheckResult { allowed })
    }

    async fn check_anonymous(&self, request: &CheckRequest) -> Result<bool, CheckError> {
        if !self.policy.grants_anonymously(&request.subject) {
            return Ok(false);
        }
        self.publicly_visible(request).await
    }

    async fn check_actor(&self, actor: &Actor, request: &CheckRequest) -> Result<bool, CheckError> {
        if actor.superuser {
            return Ok(true);
        }

        if self.policy.grants_publicly(&request.subject) && self.publicly_visible(request).await? {
            return Ok(true);
        }

        if !self.policy.activation_allows(actor, &request.action) {
            return Ok(false);
        }

        let query = GrantQuery::new(&request.subject, &request.action, &request.target);

        if self.reader.grant_exists_for_actor(&query, actor.id).await? {
            return Ok(true);
        }

        if !self.policy.inherits_through_organizations(&request.target) {
            return Ok(false);
        }

        self.reader
            .grant_exists_for_organizations(&query, actor.id)
            .await
    }

    /// Whether the target is a public instance and the action only reads it.
    async fn publicly_visible(&self, request: &CheckRequest) -> Result<bool, CheckError> {
        let SubjectRef::Composite(id) = request.target else {
            return Ok(false);
        };
        if !is_visibility_action(&request.action) {
            return Ok(false);
        }

        let state = self.reader.visibility(id).await?;
        Ok(state.is_some_and(|state| self.policy.visibility_grants(&request.action, &state)))
    }
}
