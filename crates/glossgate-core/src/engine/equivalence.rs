//! Sweeps a fixed permission model and asserts both evaluators agree.

use std::sync::Arc;

use crate::acl::GrantAclSource;
use crate::model::{Actor, CompositeId, GrantScope, SessionId, SubjectRef, VisibilityState};
use crate::policy::Policy;

use super::testing::TestReader;
use super::{CheckEngine, CheckRequest, DirectEngine};

const ACTIONS: [&str; 6] = ["view", "preview", "edit", "create", "delete", "approve"];
const SUBJECTS: [&str; 4] = [
    "perspective",
    "dictionary",
    "approve_entities",
    "lexical_entries_and_entities",
];

fn fixture() -> TestReader {
    let mut reader = TestReader::new()
        .actor(Actor::new(1).with_superuser(), 10)
        .actor(Actor::new(2), 20)
        .actor(Actor::new(3), 30)
        .actor(Actor::new(4).deactivated(), 40)
        .actor(Actor::new(5), 50)
        .actor(Actor::new(6).deactivated(), 60)
        .member(7, 3)
        .member(7, 6)
        .member(8, 5)
        .state(1, 1, VisibilityState::Published)
        .state(1, 2, VisibilityState::LimitedAccess)
        .state(1, 3, VisibilityState::Draft)
        .state(2, 1, VisibilityState::Hidden)
        .state(2, 2, VisibilityState::Other("Archived".into()));

    for subject in SUBJECTS {
        reader = reader
            .grant_to_actor(
                2,
                subject,
                "edit",
                GrantScope::Composite(CompositeId::new(1, 1)),
            )
            .grant_to_actor(2, subject, "view", GrantScope::Object(2))
            .grant_to_actor(
                4,
                subject,
                "view",
                GrantScope::Composite(CompositeId::new(1, 3)),
            )
            .grant_to_actor(
                4,
                subject,
                "edit",
                GrantScope::Composite(CompositeId::new(1, 3)),
            )
            .grant_to_actor(4, subject, "delete", GrantScope::Override)
            .grant_to_organization(7, subject, "approve", GrantScope::Object(1))
            .grant_to_organization(
                7,
                subject,
                "view",
                GrantScope::Composite(CompositeId::new(2, 2)),
            )
            .grant_to_organization(8, subject, "create", GrantScope::Override);
    }

    reader
        .grant_to_actor(3, "perspective", "create", GrantScope::Override)
        .grant_to_actor(
            5,
            "dictionary",
            "preview",
            GrantScope::Composite(CompositeId::new(2, 1)),
        )
}

fn targets() -> Vec<SubjectRef> {
    let mut targets: Vec<SubjectRef> = (1..=3).map(SubjectRef::Single).collect();
    for client_id in 1..=2 {
        for object_id in 1..=3 {
            targets.push(SubjectRef::composite(client_id, object_id));
        }
    }
    targets
}

fn sessions() -> Vec<Option<SessionId>> {
    let mut sessions = vec![None, Some(SessionId::new(999))];
    sessions.extend([10, 20, 30, 40, 50, 60].map(|id| Some(SessionId::new(id))));
    sessions
}

#[tokio::test]
async fn evaluators_agree_on_instance_targets() {
    let reader = Arc::new(fixture());
    let policy = Arc::new(Policy::default());
    let acl = Arc::new(GrantAclSource::new(Arc::clone(&reader), Arc::clone(&policy)));
    let general = CheckEngine::new(Arc::clone(&reader), acl, Arc::clone(&policy));
    let direct = DirectEngine::new(reader, policy);

    let mut checked = 0;
    let mut allowed = 0;
    for session in sessions() {
        for subject in SUBJECTS {
            for action in ACTIONS {
                for target in targets() {
                    let req = CheckRequest::new(session, action, subject, target);
                    let by_acl = general.check(&req).await.unwrap().allowed;
                    let by_query = direct.check(&req).await.unwrap().allowed;

                    assert_eq!(by_acl, by_query, "evaluators disagree on {req:?}");
                    checked += 1;
                    if by_acl {
                        allowed += 1;
                    }
                }
            }
        }
    }

    // Guard against a fixture that denies everything.
    assert!(
        allowed > 0 && allowed < checked,
        "{allowed} of {checked} allowed"
    );
}

#[tokio::test]
async fn evaluators_agree_on_actor_held_creation_rights() {
    let reader = Arc::new(fixture());
    let policy = Arc::new(Policy::default());
    let acl = Arc::new(GrantAclSource::new(Arc::clone(&reader), Arc::clone(&policy)));
    let general = CheckEngine::new(Arc::clone(&reader), acl, Arc::clone(&policy));
    let direct = DirectEngine::new(reader, policy);

    // Organization 8 is the only organization holding an override grant; its member
    // (session 50) is covered by the divergence test below.
    for session in [None, Some(10), Some(20), Some(30), Some(40), Some(60)] {
        for subject in SUBJECTS {
            for action in ACTIONS {
                let req = CheckRequest::new(
                    session.map(SessionId::new),
                    action,
                    subject,
                    SubjectRef::Creation,
                );
                let by_acl = general.check(&req).await.unwrap().allowed;
                let by_query = direct.check(&req).await.unwrap().allowed;

                assert_eq!(by_acl, by_query, "evaluators disagree on {req:?}");
            }
        }
    }
}

#[tokio::test]
async fn organization_override_creation_is_the_known_divergence() {
    let reader = Arc::new(fixture());
    let policy = Arc::new(Policy::default());
    let acl = Arc::new(GrantAclSource::new(Arc::clone(&reader), Arc::clone(&policy)));
    let general = CheckEngine::new(Arc::clone(&reader), acl, Arc::clone(&policy));
    let direct = DirectEngine::new(reader, policy);

    let req = CheckRequest::new(
        Some(SessionId::new(50)),
        "create",
        "dictionary",
        SubjectRef::Creation,
    );

    assert!(general.check(&req).await.unwrap().allowed);
    assert!(!direct.check(&req).await.unwrap().allowed);
}
