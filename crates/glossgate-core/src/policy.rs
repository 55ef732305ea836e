//! Rule table shared by the ACL-driven and the direct evaluators.
//!
//! Both evaluators answer the same question: is there a grant whose template
//! matches (subject, action) and whose scope covers the target, held by the
//! actor (or one of the actor's organizations), surviving the activation
//! guard? Visibility rules add `view`/`preview` on public instances. Keeping
//! every piece of that predicate here is what makes the two evaluators agree.

use std::collections::BTreeSet;

use crate::model::{Actor, Grant, SubjectRef, VisibilityState};

pub const VIEW: &str = "view";
pub const PREVIEW: &str = "preview";

/// Actions a public instance grants without membership.
pub const VISIBILITY_ACTIONS: [&str; 2] = [VIEW, PREVIEW];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Subject types whose public instances are readable with no resolvable actor.
    pub anonymous_subjects: BTreeSet<String>,
    /// Subject types whose public instances are readable by any resolved actor,
    /// regardless of membership or activation.
    pub public_subjects: BTreeSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            anonymous_subjects: [
                "perspective",
                "approve_entities",
                "lexical_entries_and_entities",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            public_subjects: ["approve_entities"].into_iter().map(String::from).collect(),
        }
    }
}

impl Policy {
    pub fn new<I, J, S, T>(anonymous_subjects: I, public_subjects: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            anonymous_subjects: anonymous_subjects.into_iter().map(Into::into).collect(),
            public_subjects: public_subjects.into_iter().map(Into::into).collect(),
        }
    }

    pub fn grants_anonymously(&self, subject: &str) -> bool {
        self.anonymous_subjects.contains(subject)
    }

    pub fn grants_publicly(&self, subject: &str) -> bool {
        self.public_subjects.contains(subject)
    }

    /// Deactivated accounts keep read access only.
    pub fn activation_allows(&self, actor: &Actor, action: &str) -> bool {
        actor.active || action == VIEW
    }

    pub fn visibility_grants(&self, action: &str, state: &VisibilityState) -> bool {
        state.is_public() && is_visibility_action(action)
    }

    /// Creation rights are never inherited from an organization.
    pub fn inherits_through_organizations(&self, target: &SubjectRef) -> bool {
        !matches!(target, SubjectRef::Creation)
    }
}

pub fn is_visibility_action(action: &str) -> bool {
    VISIBILITY_ACTIONS.contains(&action)
}

/// "Does a grant exist for this exact action, subject type and target?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantQuery<'a> {
    pub subject: &'a str,
    pub action: &'a str,
    pub target: &'a SubjectRef,
}

impl<'a> GrantQuery<'a> {
    pub fn new(subject: &'a str, action: &'a str, target: &'a SubjectRef) -> Self {
        Self {
            subject,
            action,
            target,
        }
    }

    pub fn matches(&self, grant: &Grant) -> bool {
        grant.subject == self.subject
            && grant.action == self.action
            && grant.scope.covers(self.target)
    }
}
