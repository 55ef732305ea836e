use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use glossgate_core::{
    Actor, ActorId, CompositeId, DefaultFor, Grant, GrantId, GrantQuery, GrantScope, OrganizationId,
    PermissionTemplate, SessionId, SubjectRef, TemplateId, VisibilityState,
};

use crate::traits::{PermissionStore, PermissionWriter, StorageError};

#[derive(Debug, Default)]
struct InnerState {
    last_id: i64,
    actors: BTreeMap<ActorId, Actor>,
    sessions: HashMap<SessionId, ActorId>,
    organizations: BTreeMap<OrganizationId, String>,
    members: BTreeSet<(OrganizationId, ActorId)>,
    templates: BTreeMap<TemplateId, PermissionTemplate>,
    grants: BTreeMap<GrantId, Grant>,
    actor_grants: BTreeSet<(ActorId, GrantId)>,
    organization_grants: BTreeSet<(OrganizationId, GrantId)>,
    visibility: HashMap<CompositeId, VisibilityState>,
}

impl InnerState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn actor_mut(&mut self, id: ActorId) -> Result<&mut Actor, StorageError> {
        self.actors
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("actor {id}")))
    }

    fn require_actor(&self, id: ActorId) -> Result<(), StorageError> {
        if self.actors.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("actor {id}")))
        }
    }

    fn require_organization(&self, id: OrganizationId) -> Result<(), StorageError> {
        if self.organizations.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("organization {id}")))
        }
    }

    fn require_grant(&self, id: GrantId) -> Result<(), StorageError> {
        if self.grants.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("grant {id}")))
        }
    }

    fn grant_for_scope(&self, template: TemplateId, scope: GrantScope) -> Option<&Grant> {
        self.grants
            .values()
            .find(|g| g.template == template && g.scope == scope)
    }

    fn held_by_actor(&self, actor: ActorId) -> impl Iterator<Item = &Grant> {
        self.actor_grants
            .iter()
            .filter(move |(holder, _)| *holder == actor)
            .filter_map(|(_, grant)| self.grants.get(grant))
    }

    fn held_by_organizations(&self, actor: ActorId) -> impl Iterator<Item = &Grant> {
        let organizations: BTreeSet<OrganizationId> = self
            .members
            .iter()
            .filter(|(_, member)| *member == actor)
            .map(|(organization, _)| *organization)
            .collect();

        self.organization_grants
            .iter()
            .filter(move |(holder, _)| organizations.contains(holder))
            .filter_map(|(_, grant)| self.grants.get(grant))
    }
}

fn subject_matches(grant: &Grant, subject: Option<&str>) -> bool {
    subject.is_none_or(|s| grant.subject == s)
}

/// Process-local store backing the unit and service tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, InnerState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Internal("in-memory store lock poisoned".to_string()))
    }
}

impl PermissionStore for InMemoryStore {
    async fn actor_for_session(&self, session: SessionId) -> Result<Option<Actor>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .sessions
            .get(&session)
            .and_then(|actor| state.actors.get(actor))
            .cloned())
    }

    async fn actor_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> Result<Vec<Grant>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .held_by_actor(actor)
            .filter(|g| subject_matches(g, subject))
            .cloned()
            .collect())
    }

    async fn organization_grants(
        &self,
        actor: ActorId,
        subject: Option<&str>,
    ) -> Result<Vec<Grant>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .held_by_organizations(actor)
            .filter(|g| subject_matches(g, subject))
            .cloned()
            .collect())
    }

    async fn subject_grants(
        &self,
        subject: &str,
        target: &SubjectRef,
    ) -> Result<Vec<Grant>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .grants
            .values()
            .filter(|g| g.subject == subject && g.scope.covers(target))
            .cloned()
            .collect())
    }

    async fn grant_exists_for_actor(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> Result<bool, StorageError> {
        let state = self.lock()?;
        let found = state.held_by_actor(actor).any(|g| query.matches(g));
        Ok(found)
    }

    async fn grant_exists_for_organizations(
        &self,
        query: &GrantQuery<'_>,
        actor: ActorId,
    ) -> Result<bool, StorageError> {
        let state = self.lock()?;
        let found = state.held_by_organizations(actor).any(|g| query.matches(g));
        Ok(found)
    }

    async fn visibility(&self, id: CompositeId) -> Result<Option<VisibilityState>, StorageError> {
        let state = self.lock()?;
        Ok(state.visibility.get(&id).cloned())
    }
}

impl PermissionWriter for InMemoryStore {
    async fn create_actor(&self) -> Result<Actor, StorageError> {
        let mut state = self.lock()?;
        let actor = Actor::new(state.next_id());
        state.actors.insert(actor.id, actor.clone());
        Ok(actor)
    }

    async fn set_actor_active(&self, actor: ActorId, active: bool) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.actor_mut(actor)?.active = active;
        Ok(())
    }

    async fn set_actor_superuser(
        &self,
        actor: ActorId,
        superuser: bool,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.actor_mut(actor)?.superuser = superuser;
        Ok(())
    }

    async fn open_session(&self, actor: ActorId) -> Result<SessionId, StorageError> {
        let mut state = self.lock()?;
        state.require_actor(actor)?;
        let session = SessionId::new(state.next_id());
        state.sessions.insert(session, actor);
        Ok(session)
    }

    async fn create_organization(&self, name: &str) -> Result<OrganizationId, StorageError> {
        let mut state = self.lock()?;
        if state.organizations.values().any(|org| org == name) {
            return Err(StorageError::Duplicate(format!("organization {name}")));
        }
        let id = OrganizationId::new(state.next_id());
        state.organizations.insert(id, name.to_string());
        Ok(id)
    }

    async fn add_organization_member(
        &self,
        organization: OrganizationId,
        actor: ActorId,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.require_organization(organization)?;
        state.require_actor(actor)?;
        state.members.insert((organization, actor));
        Ok(())
    }

    async fn create_template(
        &self,
        subject: &str,
        action: &str,
        defaults: &[DefaultFor],
    ) -> Result<PermissionTemplate, StorageError> {
        let mut state = self.lock()?;
        if state
            .templates
            .values()
            .any(|t| t.subject == subject && t.action == action)
        {
            return Err(StorageError::Duplicate(format!("template {action}:{subject}")));
        }

        let mut template = PermissionTemplate::new(state.next_id(), subject, action);
        for kind in defaults {
            template = match kind {
                DefaultFor::Dictionary => template.dictionary_default(),
                DefaultFor::Perspective => template.perspective_default(),
            };
        }
        state.templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn default_templates(
        &self,
        kind: DefaultFor,
    ) -> Result<Vec<PermissionTemplate>, StorageError> {
        let state = self.lock()?;
        Ok(state
            .templates
            .values()
            .filter(|t| t.is_default_for(kind))
            .cloned()
            .collect())
    }

    async fn create_grant(
        &self,
        template: TemplateId,
        scope: GrantScope,
    ) -> Result<Grant, StorageError> {
        let mut state = self.lock()?;
        let Some(template) = state.templates.get(&template).cloned() else {
            return Err(StorageError::NotFound(format!("template {template}")));
        };
        if state.grant_for_scope(template.id, scope).is_some() {
            return Err(StorageError::Duplicate(format!(
                "grant of template {} for this scope",
                template.id
            )));
        }

        let grant = Grant::new(state.next_id(), &template, scope);
        state.grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn provision_defaults(
        &self,
        kind: DefaultFor,
        id: CompositeId,
        owner: ActorId,
    ) -> Result<Vec<Grant>, StorageError> {
        let mut state = self.lock()?;
        state.require_actor(owner)?;

        let templates: Vec<PermissionTemplate> = state
            .templates
            .values()
            .filter(|t| t.is_default_for(kind))
            .cloned()
            .collect();

        let scope = GrantScope::Composite(id);
        let mut grants = Vec::with_capacity(templates.len());
        for template in &templates {
            let existing = state.grant_for_scope(template.id, scope).cloned();
            let grant = match existing {
                Some(existing) => existing,
                None => {
                    let grant = Grant::new(state.next_id(), template, scope);
                    state.grants.insert(grant.id, grant.clone());
                    grant
                }
            };
            state.actor_grants.insert((owner, grant.id));
            grants.push(grant);
        }
        Ok(grants)
    }

    async fn assign_grant_to_actor(
        &self,
        grant: GrantId,
        actor: ActorId,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.require_grant(grant)?;
        state.require_actor(actor)?;
        state.actor_grants.insert((actor, grant));
        Ok(())
    }

    async fn assign_grant_to_organization(
        &self,
        grant: GrantId,
        organization: OrganizationId,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.require_grant(grant)?;
        state.require_organization(organization)?;
        state.organization_grants.insert((organization, grant));
        Ok(())
    }

    async fn set_visibility(
        &self,
        id: CompositeId,
        state: VisibilityState,
    ) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        inner.visibility.insert(id, state);
        Ok(())
    }
}
