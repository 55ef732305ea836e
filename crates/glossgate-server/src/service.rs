use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use glossgate_core::{
    ActorId, CheckEngine, CheckRequest, CheckResult, CompositeId, DefaultFor, DirectEngine, Grant,
    GrantAclSource, Policy, PrincipalResolution, PrincipalResolver, PrincipalSet, SessionId,
    SubjectRef, resolve_effective_session,
};
use glossgate_storage::{PermissionStore, PermissionWriter};

use crate::adapter::StorePermissionReader;
use crate::audit;
use crate::error::ApiError;

/// Which evaluator answers `check_permission`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Evaluator {
    #[default]
    General,
    Direct,
    /// Runs both and denies when they disagree.
    Verify,
}

impl Evaluator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Evaluator::General => "general",
            Evaluator::Direct => "direct",
            Evaluator::Verify => "verify",
        }
    }
}

impl fmt::Display for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Evaluator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Evaluator::General),
            "direct" => Ok(Evaluator::Direct),
            "verify" => Ok(Evaluator::Verify),
            other => Err(format!("unknown evaluator '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckInput {
    pub session: Option<SessionId>,
    pub desktop_cookie: Option<String>,
    pub action: String,
    pub subject: String,
    pub target: SubjectRef,
}

impl CheckInput {
    pub fn new(
        session: Option<SessionId>,
        action: impl Into<String>,
        subject: impl Into<String>,
        target: SubjectRef,
    ) -> Self {
        Self {
            session,
            desktop_cookie: None,
            action: action.into(),
            subject: subject.into(),
            target,
        }
    }

    pub fn with_desktop_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.desktop_cookie = Some(cookie.into());
        self
    }
}

pub struct AuthzService<S: PermissionStore> {
    store: Arc<S>,
    policy: Arc<Policy>,
    desktop_mode: bool,
    evaluator: Evaluator,
}

impl<S: PermissionStore> AuthzService<S> {
    pub fn new(store: Arc<S>, policy: Policy, desktop_mode: bool, evaluator: Evaluator) -> Self {
        Self {
            store,
            policy: Arc::new(policy),
            desktop_mode,
            evaluator,
        }
    }

    pub fn evaluator(&self) -> Evaluator {
        self.evaluator
    }

    pub fn effective_session(
        &self,
        raw: Option<SessionId>,
        desktop_cookie: Option<&str>,
    ) -> Option<SessionId> {
        resolve_effective_session(raw, self.desktop_mode, desktop_cookie)
    }

    pub async fn resolve_principals(
        &self,
        raw: Option<SessionId>,
        desktop_cookie: Option<&str>,
        subject: Option<&str>,
    ) -> Result<PrincipalResolution, ApiError> {
        let session = self.effective_session(raw, desktop_cookie);
        let resolver = PrincipalResolver::new(self.reader(), Arc::clone(&self.policy));

        let resolution = resolver.resolve(session, subject).await?;
        if let PrincipalResolution::InvalidSession(session) = &resolution {
            audit::audit_session_invalidated(*session);
        }
        Ok(resolution)
    }

    /// Like `resolve_principals`, but an unresolvable session is an error so
    /// the caller can force re-authentication.
    pub async fn require_principals(
        &self,
        raw: Option<SessionId>,
        desktop_cookie: Option<&str>,
        subject: Option<&str>,
    ) -> Result<PrincipalSet, ApiError> {
        match self.resolve_principals(raw, desktop_cookie, subject).await? {
            PrincipalResolution::InvalidSession(session) => Err(ApiError::InvalidSession(session)),
            resolution => Ok(resolution.into_principals()),
        }
    }

    pub async fn check(&self, input: &CheckInput) -> Result<CheckResult, ApiError> {
        let request = self.request(input);
        let result = self.evaluate_general(&request).await?;
        audit_result(Evaluator::General, &request, result);
        Ok(result)
    }

    pub async fn check_direct(&self, input: &CheckInput) -> Result<CheckResult, ApiError> {
        let request = self.request(input);
        let result = self.evaluate_direct(&request).await?;
        audit_result(Evaluator::Direct, &request, result);
        Ok(result)
    }

    pub async fn check_permission(&self, input: &CheckInput) -> Result<CheckResult, ApiError> {
        match self.evaluator {
            Evaluator::General => self.check(input).await,
            Evaluator::Direct => self.check_direct(input).await,
            Evaluator::Verify => {
                let request = self.request(input);
                let general = self.evaluate_general(&request).await?;
                let direct = self.evaluate_direct(&request).await?;

                if general != direct {
                    audit::audit_disagreement(
                        request.session,
                        &request.subject,
                        &request.action,
                        &request.target,
                        general.allowed,
                        direct.allowed,
                    );
                }

                let result = CheckResult {
                    allowed: general.allowed && direct.allowed,
                };
                audit_result(Evaluator::Verify, &request, result);
                Ok(result)
            }
        }
    }

    /// Answers a request whose subject reference arrives untyped. Any fault
    /// is logged and reported as a denial.
    pub async fn authorize(
        &self,
        raw: Option<SessionId>,
        desktop_cookie: Option<&str>,
        action: &str,
        subject: &str,
        raw_target: &serde_json::Value,
    ) -> bool {
        let target = match SubjectRef::try_from(raw_target) {
            Ok(target) => target,
            Err(e) => {
                audit::audit_fault(subject, action, &e.to_string());
                return false;
            }
        };

        let mut input = CheckInput::new(raw, action, subject, target);
        input.desktop_cookie = desktop_cookie.map(str::to_string);

        match self.check_permission(&input).await {
            Ok(result) => result.allowed,
            Err(e) => {
                audit::audit_fault(subject, action, &e.to_string());
                false
            }
        }
    }

    fn reader(&self) -> Arc<StorePermissionReader<S>> {
        Arc::new(StorePermissionReader::new(Arc::clone(&self.store)))
    }

    fn request(&self, input: &CheckInput) -> CheckRequest {
        let session = self.effective_session(input.session, input.desktop_cookie.as_deref());
        CheckRequest::new(session, &input.action, &input.subject, input.target)
    }

    async fn evaluate_general(&self, request: &CheckRequest) -> Result<CheckResult, ApiError> {
        let reader = self.reader();
        let acl = GrantAclSource::new(Arc::clone(&reader), Arc::clone(&self.policy));
        let engine = CheckEngine::new(reader, Arc::new(acl), Arc::clone(&self.policy));
        Ok(engine.check(request).await?)
    }

    async fn evaluate_direct(&self, request: &CheckRequest) -> Result<CheckResult, ApiError> {
        let engine = DirectEngine::new(self.reader(), Arc::clone(&self.policy));
        Ok(engine.check(request).await?)
    }
}

impl<S: PermissionStore + PermissionWriter> AuthzService<S> {
    /// Instantiates every default template of `kind` for a freshly created
    /// instance and attaches the grants to its owner. Grants that already
    /// exist for the instance are reused.
    pub async fn provision_subject(
        &self,
        kind: DefaultFor,
        id: CompositeId,
        owner: ActorId,
    ) -> Result<Vec<Grant>, ApiError> {
        let grants = self.store.provision_defaults(kind, id, owner).await?;
        audit::audit_provisioned(kind, id, owner, grants.len());
        Ok(grants)
    }
}

fn audit_result(evaluator: Evaluator, request: &CheckRequest, result: CheckResult) {
    audit::audit_decision(
        evaluator.as_str(),
        request.session,
        &request.subject,
        &request.action,
        &request.target,
        result.allowed,
    );
}
