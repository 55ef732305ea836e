use std::sync::Arc;

use crate::acl::{AclAction, AclSource};
use crate::policy::Policy;

use super::principals::PrincipalResolver;
use super::{CheckError, CheckRequest, CheckResult, PermissionReader};

/// Evaluates a request against the ACL of its subject using the caller's
/// principal set.
pub struct CheckEngine<R: PermissionReader, A: AclSource> {
    resolver: PrincipalResolver<R>,
    acl: Arc<A>,
}

impl<R: PermissionReader, A: AclSource> CheckEngine<R, A> {
    pub fn new(reader: Arc<R>, acl: Arc<A>, policy: Arc<Policy>) -> Self {
        Self {
            resolver: PrincipalResolver::new(reader, policy),
            acl,
        }
    }

    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResult, CheckError> {
        let principals = self
            .resolver
            .resolve(request.session, Some(&request.subject))
            .await?
            .into_principals();

        let acl = self.acl.list_acl(&request.subject, &request.target).await?;

        for entry in &acl {
            if !principals.contains(&entry.principal) {
                continue;
            }
            if !entry.permission.permits(&request.action) {
                continue;
            }
            let allowed = entry.action == AclAction::Allow;
            tracing::trace!(
                principal = %entry.principal,
                allowed,
                "acl entry matched"
            );
            return Ok(CheckResult { allowed });
        }

        Ok(CheckResult { allowed: false })
    }
}
