use std::future::Future;
use std::sync::Arc;

use crate::engine::{CheckError, PermissionReader};
use crate::model::SubjectRef;
use crate::policy::{Policy, VISIBILITY_ACTIONS};
use crate::token::{ADMIN, AUTHENTICATED, EVERYONE, PrincipalToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclPermission {
    Action(String),
    /// Every action is permitted for the entry's principal.
    All,
}

impl AclPermission {
    pub fn permits(&self, action: &str) -> bool {
        match self {
            AclPermission::Action(permitted) => permitted == action,
            AclPermission::All => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub action: AclAction,
    pub principal: String,
    pub permission: AclPermission,
}

impl AclEntry {
    pub fn allow(principal: impl Into<String>, permission: AclPermission) -> Self {
        Self {
            action: AclAction::Allow,
            principal: principal.into(),
            permission,
        }
    }

    pub fn deny(principal: impl Into<String>, permission: AclPermission) -> Self {
        Self {
            action: AclAction::Deny,
            principal: principal.into(),
            permission,
        }
    }
}

/// Produces the rules that apply to a subject type and target.
pub trait AclSource: Send + Sync {
    fn list_acl(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> impl Future<Output = Result<Vec<AclEntry>, CheckError>> + Send;
}

/// ACL built from the stored grants and the visibility rules of a [`Policy`].
pub struct GrantAclSource<R: PermissionReader> {
    reader: Arc<R>,
    policy: Arc<Policy>,
}

impl<R: PermissionReader> GrantAclSource<R> {
    pub fn new(reader: Arc<R>, policy: Arc<Policy>) -> Self {
        Self { reader, policy }
    }

    async fn visibility_entries(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> Result<Vec<AclEntry>, CheckError> {
        let SubjectRef::Composite(id) = target else {
            return Ok(Vec::new());
        };

        let mut principals = Vec::new();
        if self.policy.grants_anonymously(subject) {
            principals.push(EVERYONE);
        }
        if self.policy.grants_publicly(subject) {
            principals.push(AUTHENTICATED);
        }
        if principals.is_empty() {
            return Ok(Vec::new());
        }

        let public = self
            .reader
            .visibility(*id)
            .await?
            .is_some_and(|state| state.is_public());
        if !public {
            return Ok(Vec::new());
        }

        Ok(principals
            .into_iter()
            .flat_map(|principal| {
                VISIBILITY_ACTIONS.into_iter().map(move |action| {
                    AclEntry::allow(principal, AclPermission::Action(action.to_string()))
                })
            })
            .collect())
    }
}

impl<R: PermissionReader> AclSource for GrantAclSource<R> {
    async fn list_acl(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> Result<Vec<AclEntry>, CheckError> {
        let mut acl = vec![AclEntry::allow(ADMIN, AclPermission::All)];

        acl.extend(self.visibility_entries(subject, target).await?);

        for grant in self.reader.subject_grants(subject, target).await? {
            acl.push(AclEntry::allow(
                PrincipalToken::for_grant(&grant).as_str(),
                AclPermission::Action(grant.action),
            ));
        }

        Ok(acl)
    }
}
