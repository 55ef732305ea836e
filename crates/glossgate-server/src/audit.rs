use glossgate_core::{ActorId, CompositeId, DefaultFor, SessionId, SubjectRef};

fn session_label(session: Option<SessionId>) -> String {
    session.map_or_else(|| "anonymous".to_string(), |s| s.to_string())
}

pub fn audit_decision(
    evaluator: &str,
    session: Option<SessionId>,
    subject: &str,
    action: &str,
    target: &SubjectRef,
    allowed: bool,
) {
    tracing::info!(
        target: "audit",
        event = "decision",
        evaluator = evaluator,
        session = %session_label(session),
        subject = subject,
        action = action,
        subject_ref = %target,
        allowed = allowed,
        "authorization decided"
    );
}

pub fn audit_session_invalidated(session: SessionId) {
    tracing::warn!(
        target: "audit",
        event = "session_invalidated",
        session = %session,
        "session no longer resolves to an actor"
    );
}

/// A request that could not be evaluated and was denied instead.
pub fn audit_fault(subject: &str, action: &str, reason: &str) {
    tracing::warn!(
        target: "audit",
        event = "fault",
        subject = subject,
        action = action,
        reason = reason,
        "authorization failed closed"
    );
}

pub fn audit_disagreement(
    session: Option<SessionId>,
    subject: &str,
    action: &str,
    target: &SubjectRef,
    general: bool,
    direct: bool,
) {
    tracing::error!(
        target: "audit",
        event = "disagreement",
        session = %session_label(session),
        subject = subject,
        action = action,
        subject_ref = %target,
        general = general,
        direct = direct,
        "evaluators disagree"
    );
}

pub fn audit_provisioned(kind: DefaultFor, id: CompositeId, owner: ActorId, grant_count: usize) {
    tracing::info!(
        target: "audit",
        event = "provisioned",
        kind = ?kind,
        subject_ref = %id,
        owner = %owner,
        grant_count = grant_count,
        "default grants attached"
    );
}
