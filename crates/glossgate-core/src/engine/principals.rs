use std::collections::BTreeSet;
use std::sync::Arc;

use crate::model::{Actor, SessionId};
use crate::policy::Policy;
use crate::token::PrincipalToken;

use super::{CheckError, PermissionReader};

/// The tokens a caller currently holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalSet {
    tokens: BTreeSet<PrincipalToken>,
}

impl PrincipalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// What a caller with no resolvable actor holds.
    pub fn anonymous() -> Self {
        let mut set = Self::new();
        set.insert(PrincipalToken::everyone());
        set
    }

    pub fn insert(&mut self, token: PrincipalToken) -> bool {
        self.tokens.insert(token)
    }

    pub fn contains(&self, principal: &str) -> bool {
        self.tokens.contains(principal)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrincipalToken> {
        self.tokens.iter()
    }
}

impl FromIterator<PrincipalToken> for PrincipalSet {
    fn from_iter<I: IntoIterator<Item = PrincipalToken>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalResolution {
    /// No session was supplied.
    Anonymous,
    /// The session does not resolve to an actor; the caller should forget it.
    InvalidSession(SessionId),
    Resolved {
        actor: Actor,
        principals: PrincipalSet,
    },
}

impl PrincipalResolution {
    pub fn principals(&self) -> Option<&PrincipalSet> {
        match self {
            PrincipalResolution::Resolved { principals, .. } => Some(principals),
            _ => None,
        }
    }

    /// Principals to evaluate an ACL against; unresolved callers are anonymous.
    pub fn into_principals(self) -> PrincipalSet {
        match self {
            PrincipalResolution::Resolved { principals, .. } => principals,
            PrincipalResolution::Anonymous | PrincipalResolution::InvalidSession(_) => {
                PrincipalSet::anonymous()
            }
        }
    }
}

pub struct PrincipalResolver<R: PermissionReader> {
    reader: Arc<R>,
    policy: Arc<Policy>,
}

impl<R: PermissionReader> PrincipalResolver<R> {
    pub fn new(reader: Arc<R>, policy: Arc<Policy>) -> Self {
        Self { reader, policy }
    }

    /// Computes the principal tokens the session's actor holds.
    ///
    /// With no subject filter only the superuser marker is reported; callers
    /// that pass a subject type get every grant of that type, direct and
    /// organization-inherited. Nothing is cached between calls.
    pub async fn resolve(
        &self,
        session: Option<SessionId>,
        subject: Option<&str>,
    ) -> Result<PrincipalResolution, CheckError> {
        let Some(session) = session else {
            return Ok(PrincipalResolution::Anonymous);
        };

        let Some(actor) = self.reader.actor_for_session(session).await? else {
            tracing::debug!(session = %session, "session does not resolve to an actor");
            return Ok(PrincipalResolution::InvalidSession(session));
        };

        let mut principals = PrincipalSet::new();
        if actor.superuser {
            principals.insert(PrincipalToken::admin());
        }

        let Some(subject) = subject else {
            return Ok(PrincipalResolution::Resolved { actor, principals });
        };

        principals.insert(PrincipalToken::authenticated());

        let direct = self.reader.actor_grants(actor.id, Some(subject)).await?;
        let inherited = self
            .reader
            .organization_grants(actor.id, Some(subject))
            .await?;

        for grant in direct.iter().chain(inherited.iter()) {
            if !self.policy.activation_allows(&actor, &grant.action) {
                continue;
            }
            principals.insert(PrincipalToken::for_grant(grant));
        }

        tracing::debug!(
            actor = %actor.id,
            subject,
            count = principals.len(),
            "resolved principals"
        );

        Ok(PrincipalResolution::Resolved { actor, principals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FailingReader, TestReader};
    use crate::model::{CompositeId, GrantScope};

    fn resolver(reader: TestReader) -> PrincipalResolver<TestReader> {
        PrincipalResolver::new(Arc::new(reader), Arc::new(Policy::default()))
    }

    fn tokens(resolution: &PrincipalResolution) -> Vec<String> {
        resolution
            .principals()
            .expect("resolved principals")
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    #[tokio::test]
    async fn missing_session_is_anonymous() {
        let resolution = resolver(TestReader::new())
            .resolve(None, Some("perspective"))
            .await
            .unwrap();

        assert_eq!(resolution, PrincipalResolution::Anonymous);
    }

    #[tokio::test]
    async fn unknown_session_is_invalid() {
        let resolution = resolver(TestReader::new())
            .resolve(Some(SessionId::new(99)), Some("perspective"))
            .await
            .unwrap();

        assert_eq!(
            resolution,
            PrincipalResolution::InvalidSession(SessionId::new(99))
        );
    }

    #[tokio::test]
    async fn no_filter_returns_empty_set_for_regular_actor() {
        let reader = TestReader::new().actor(Actor::new(2), 20).grant_to_actor(
            2,
            "perspective",
            "view",
            GrantScope::Override,
        );

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(20)), None)
            .await
            .unwrap();

        assert!(resolution.principals().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_filter_returns_admin_for_superuser() {
        let reader = TestReader::new().actor(Actor::new(1).with_superuser(), 10);

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(10)), None)
            .await
            .unwrap();

        assert_eq!(tokens(&resolution), vec!["Admin"]);
    }

    #[tokio::test]
    async fn superuser_always_holds_admin() {
        let reader = TestReader::new().actor(Actor::new(1).with_superuser(), 10);

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(10)), Some("dictionary"))
            .await
            .unwrap();

        assert!(resolution.principals().unwrap().contains("Admin"));
    }

    #[tokio::test]
    async fn collects_direct_and_organization_grants() {
        let reader = TestReader::new()
            .actor(Actor::new(2), 20)
            .member(7, 2)
            .grant_to_actor(
                2,
                "perspective",
                "view",
                GrantScope::Composite(CompositeId::new(5, 42)),
            )
            .grant_to_organization(7, "perspective", "edit", GrantScope::Object(42))
            .grant_to_organization(7, "perspective", "create", GrantScope::Override);

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(20)), Some("perspective"))
            .await
            .unwrap();

        assert_eq!(
            tokens(&resolution),
            vec![
                "create:perspective:True",
                "edit:perspective:42",
                "system.Authenticated",
                "view:perspective:5:42",
            ]
        );
    }

    #[tokio::test]
    async fn subject_filter_excludes_other_subjects() {
        let reader = TestReader::new()
            .actor(Actor::new(2), 20)
            .grant_to_actor(2, "dictionary", "edit", GrantScope::Object(1))
            .grant_to_actor(2, "perspective", "edit", GrantScope::Object(1));

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(20)), Some("dictionary"))
            .await
            .unwrap();

        let set = resolution.principals().unwrap();
        assert!(set.contains("edit:dictionary:1"));
        assert!(!set.contains("edit:perspective:1"));
    }

    #[tokio::test]
    async fn organizations_of_other_actors_do_not_leak() {
        let reader = TestReader::new()
            .actor(Actor::new(2), 20)
            .member(7, 3)
            .grant_to_organization(7, "perspective", "edit", GrantScope::Override);

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(20)), Some("perspective"))
            .await
            .unwrap();

        assert!(!resolution.principals().unwrap().contains("edit:perspective:True"));
    }

    #[tokio::test]
    async fn inactive_actor_keeps_only_view_grants() {
        let reader = TestReader::new()
            .actor(Actor::new(2).deactivated(), 20)
            .member(7, 2)
            .grant_to_actor(2, "perspective", "view", GrantScope::Object(1))
            .grant_to_actor(2, "perspective", "edit", GrantScope::Object(1))
            .grant_to_organization(7, "perspective", "delete", GrantScope::Object(1));

        let resolution = resolver(reader)
            .resolve(Some(SessionId::new(20)), Some("perspective"))
            .await
            .unwrap();

        assert_eq!(
            tokens(&resolution),
            vec!["system.Authenticated", "view:perspective:1"]
        );
    }

    #[tokio::test]
    async fn unresolved_callers_evaluate_as_everyone() {
        let set = PrincipalResolution::InvalidSession(SessionId::new(3)).into_principals();

        assert!(set.contains("system.Everyone"));
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let resolver = PrincipalResolver::new(Arc::new(FailingReader), Arc::new(Policy::default()));

        let err = resolver
            .resolve(Some(SessionId::new(1)), Some("perspective"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, CheckError::StorageError(ref msg) if msg.contains("unavailable")),
            "expected StorageError, got: {err}"
        );
    }
}
