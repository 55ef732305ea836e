use glossgate_core::{
    Actor, ActorId, CompositeId, DefaultFor, Grant, GrantId, GrantQuery, GrantScope, OrganizationId,
    PermissionTemplate, SessionId, SubjectRef, TemplateId, VisibilityState,
};

use crate::traits::StorageError;

const GRANT_COLUMNS: &str = "g.id, g.template_id, t.subject, t.action, g.is_override, \
                             g.subject_client_id, g.subject_object_id";

const TEMPLATE_COLUMNS: &str = "id, subject, action, dictionary_default, perspective_default";

type GrantRow = (i64, i64, String, String, bool, Option<i64>, Option<i64>);
type TemplateRow = (i64, String, String, bool, bool);

fn to_storage_error(e: sqlx::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

/// Maps constraint violations on inserts to the matching storage error.
fn to_write_error(e: sqlx::Error, what: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StorageError::Duplicate(what.to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StorageError::NotFound(what.to_string());
        }
    }
    to_storage_error(e)
}

/// SQL predicate over `g` (permission_grants) selecting grants whose scope
/// covers `target`, numbering placeholders from `first_bind`.
///
/// Mirrors `GrantScope::covers`: override grants cover everything, single
/// targets match on the object id alone, composite targets need both ids.
pub fn scope_condition(target: &SubjectRef, first_bind: usize) -> (String, Vec<i64>) {
    match target {
        SubjectRef::Creation => ("g.is_override".to_string(), Vec::new()),
        SubjectRef::Single(object_id) => (
            format!("(g.is_override OR g.subject_object_id = ${first_bind})"),
            vec![*object_id],
        ),
        SubjectRef::Composite(id) => (
            format!(
                "(g.is_override OR (g.subject_client_id = ${} AND g.subject_object_id = ${}))",
                first_bind,
                first_bind + 1
            ),
            vec![id.client_id, id.object_id],
        ),
    }
}

/// Column values for a scope, as stored in permission_grants.
pub fn scope_columns(scope: &GrantScope) -> (bool, Option<i64>, Option<i64>) {
    match scope {
        GrantScope::Override => (true, None, None),
        GrantScope::Object(object_id) => (false, None, Some(*object_id)),
        GrantScope::Composite(id) => (false, Some(id.client_id), Some(id.object_id)),
    }
}

pub fn scope_from_columns(
    is_override: bool,
    client_id: Option<i64>,
    object_id: Option<i64>,
) -> Result<GrantScope, StorageError> {
    match (is_override, client_id, object_id) {
        (true, None, None) => Ok(GrantScope::Override),
        (false, None, Some(object_id)) => Ok(GrantScope::Object(object_id)),
        (false, Some(client_id), Some(object_id)) => {
            Ok(GrantScope::Composite(CompositeId::new(client_id, object_id)))
        }
        _ => Err(StorageError::Internal(format!(
            "grant row has an invalid scope (override={is_override}, client={client_id:?}, object={object_id:?})"
        ))),
    }
}

fn grant_from_row(row: GrantRow) -> Result<Grant, StorageError> {
    let (id, template, subject, action, is_override, client_id, object_id) = row;
    Ok(Grant {
        id: GrantId::new(id),
        template: TemplateId::new(template),
        subject,
        action,
        scope: scope_from_columns(is_override, client_id, object_id)?,
    })
}

fn template_from_row(row: TemplateRow) -> PermissionTemplate {
    let (id, subject, action, dictionary_default, perspective_default) = row;
    PermissionTemplate {
        id: TemplateId::new(id),
        subject,
        action,
        dictionary_default,
        perspective_default,
    }
}

// --- Reads ---

pub async fn actor_for_session<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    session: SessionId,
) -> Result<Option<Actor>, StorageError> {
    let row: Option<(i64, bool, bool)> = sqlx::query_as(
        r#"
        SELECT a.id, a.active, a.superuser
        FROM sessions s
        JOIN actors a ON a.id = s.actor_id
        WHERE s.id = $1
        "#,
    )
    .bind(session.value())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(row.map(|(id, active, superuser)| Actor {
        id: ActorId::new(id),
        active,
        superuser,
    }))
}

pub async fn actor_grants<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    actor: ActorId,
    subject: Option<&str>,
) -> Result<Vec<Grant>, StorageError> {
    let query = format!(
        r#"
        SELECT {GRANT_COLUMNS}
        FROM actor_grants ag
        JOIN permission_grants g ON g.id = ag.grant_id
        JOIN permission_templates t ON t.id = g.template_id
        WHERE ag.actor_id = $1 AND ($2::TEXT IS NULL OR t.subject = $2)
        ORDER BY g.id
        "#
    );
    let rows: Vec<GrantRow> = sqlx::query_as(&query)
        .bind(actor.value())
        .bind(subject)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;

    rows.into_iter().map(grant_from_row).collect()
}

pub async fn organization_grants<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    actor: ActorId,
    subject: Option<&str>,
) -> Result<Vec<Grant>, StorageError> {
    let query = format!(
        r#"
        SELECT DISTINCT {GRANT_COLUMNS}
        FROM organization_members m
        JOIN organization_grants og ON og.organization_id = m.organization_id
        JOIN permission_grants g ON g.id = og.grant_id
        JOIN permission_templates t ON t.id = g.template_id
        WHERE m.actor_id = $1 AND ($2::TEXT IS NULL OR t.subject = $2)
        ORDER BY g.id
        "#
    );
    let rows: Vec<GrantRow> = sqlx::query_as(&query)
        .bind(actor.value())
        .bind(subject)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;

    rows.into_iter().map(grant_from_row).collect()
}

pub async fn subject_grants<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    subject: &str,
    target: &SubjectRef,
) -> Result<Vec<Grant>, StorageError> {
    let (scope, binds) = scope_condition(target, 2);
    let query = format!(
        r#"
        SELECT {GRANT_COLUMNS}
        FROM permission_grants g
        JOIN permission_templates t ON t.id = g.template_id
        WHERE t.subject = $1 AND {scope}
        ORDER BY g.id
        "#
    );

    let mut q = sqlx::query_as::<_, GrantRow>(&query).bind(subject);
    for bind in binds {
        q = q.bind(bind);
    }
    let rows = q.fetch_all(executor).await.map_err(to_storage_error)?;

    rows.into_iter().map(grant_from_row).collect()
}

/// Which holder table an existence check walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Actor,
    Organizations,
}

impl Holder {
    fn from_clause(self) -> &'static str {
        match self {
            Holder::Actor => {
                "actor_grants h \
                 JOIN permission_grants g ON g.id = h.grant_id"
            }
            Holder::Organizations => {
                "organization_members m \
                 JOIN organization_grants h ON h.organization_id = m.organization_id \
                 JOIN permission_grants g ON g.id = h.grant_id"
            }
        }
    }

    fn actor_column(self) -> &'static str {
        match self {
            Holder::Actor => "h.actor_id",
            Holder::Organizations => "m.actor_id",
        }
    }
}

pub fn grant_exists_sql(holder: Holder, target: &SubjectRef) -> (String, Vec<i64>) {
    let (scope, binds) = scope_condition(target, 4);
    let query = format!(
        "SELECT EXISTS (SELECT 1 FROM {} \
         JOIN permission_templates t ON t.id = g.template_id \
         WHERE {} = $1 AND t.subject = $2 AND t.action = $3 AND {scope})",
        holder.from_clause(),
        holder.actor_column(),
    );
    (query, binds)
}

pub async fn grant_exists<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    holder: Holder,
    query: &GrantQuery<'_>,
    actor: ActorId,
) -> Result<bool, StorageError> {
    let (sql, binds) = grant_exists_sql(holder, query.target);

    let mut q = sqlx::query_as::<_, (bool,)>(&sql)
        .bind(actor.value())
        .bind(query.subject)
        .bind(query.action);
    for bind in binds {
        q = q.bind(bind);
    }
    let (exists,) = q.fetch_one(executor).await.map_err(to_storage_error)?;
    Ok(exists)
}

pub async fn visibility<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: CompositeId,
) -> Result<Option<VisibilityState>, StorageError> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT state FROM subject_visibility WHERE client_id = $1 AND object_id = $2",
    )
    .bind(id.client_id)
    .bind(id.object_id)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(row.map(|(state,)| VisibilityState::parse(&state)))
}

// --- Writes ---

pub async fn insert_actor<'e>(executor: impl sqlx::PgExecutor<'e>) -> Result<Actor, StorageError> {
    let (id, active, superuser): (i64, bool, bool) = sqlx::query_as(
        "INSERT INTO actors DEFAULT VALUES RETURNING id, active, superuser",
    )
    .fetch_one(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(Actor {
        id: ActorId::new(id),
        active,
        superuser,
    })
}

/// Sets one boolean flag column on an actor.
pub async fn update_actor_flag<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    actor: ActorId,
    column: ActorFlag,
    value: bool,
) -> Result<(), StorageError> {
    let query = format!("UPDATE actors SET {} = $2 WHERE id = $1", column.as_str());
    let result = sqlx::query(&query)
        .bind(actor.value())
        .bind(value)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound(format!("actor {actor}")));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlag {
    Active,
    Superuser,
}

impl ActorFlag {
    fn as_str(self) -> &'static str {
        match self {
            ActorFlag::Active => "active",
            ActorFlag::Superuser => "superuser",
        }
    }
}

pub async fn insert_session<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    actor: ActorId,
) -> Result<SessionId, StorageError> {
    let (id,): (i64,) = sqlx::query_as("INSERT INTO sessions (actor_id) VALUES ($1) RETURNING id")
        .bind(actor.value())
        .fetch_one(executor)
        .await
        .map_err(|e| to_write_error(e, &format!("actor {actor}")))?;
    Ok(SessionId::new(id))
}

pub async fn insert_organization<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    name: &str,
) -> Result<OrganizationId, StorageError> {
    let (id,): (i64,) = sqlx::query_as("INSERT INTO organizations (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(executor)
        .await
        .map_err(|e| to_write_error(e, &format!("organization {name}")))?;
    Ok(OrganizationId::new(id))
}

pub async fn insert_member<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    organization: OrganizationId,
    actor: ActorId,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO organization_members (organization_id, actor_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(organization.value())
    .bind(actor.value())
    .execute(executor)
    .await
    .map_err(|e| to_write_error(e, &format!("organization {organization} or actor {actor}")))?;
    Ok(())
}

pub async fn insert_template<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    subject: &str,
    action: &str,
    defaults: &[DefaultFor],
) -> Result<PermissionTemplate, StorageError> {
    let query = format!(
        "INSERT INTO permission_templates (subject, action, dictionary_default, perspective_default) \
         VALUES ($1, $2, $3, $4) RETURNING {TEMPLATE_COLUMNS}"
    );
    let row: TemplateRow = sqlx::query_as(&query)
        .bind(subject)
        .bind(action)
        .bind(defaults.contains(&DefaultFor::Dictionary))
        .bind(defaults.contains(&DefaultFor::Perspective))
        .fetch_one(executor)
        .await
        .map_err(|e| to_write_error(e, &format!("template {action}:{subject}")))?;
    Ok(template_from_row(row))
}

pub async fn template<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: TemplateId,
) -> Result<Option<PermissionTemplate>, StorageError> {
    let query = format!("SELECT {TEMPLATE_COLUMNS} FROM permission_templates WHERE id = $1");
    let row: Option<TemplateRow> = sqlx::query_as(&query)
        .bind(id.value())
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.map(template_from_row))
}

pub async fn default_templates<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    kind: DefaultFor,
) -> Result<Vec<PermissionTemplate>, StorageError> {
    let column = match kind {
        DefaultFor::Dictionary => "dictionary_default",
        DefaultFor::Perspective => "perspective_default",
    };
    let query =
        format!("SELECT {TEMPLATE_COLUMNS} FROM permission_templates WHERE {column} ORDER BY id");
    let rows: Vec<TemplateRow> = sqlx::query_as(&query)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(template_from_row).collect())
}

pub async fn insert_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    template: &PermissionTemplate,
    scope: GrantScope,
) -> Result<Grant, StorageError> {
    let (is_override, client_id, object_id) = scope_columns(&scope);
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO permission_grants (template_id, is_override, subject_client_id, subject_object_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(template.id.value())
    .bind(is_override)
    .bind(client_id)
    .bind(object_id)
    .fetch_one(executor)
    .await
    .map_err(|e| to_write_error(e, &format!("grant of template {}", template.id)))?;

    Ok(Grant::new(id, template, scope))
}

/// The grant instantiating `template` for exactly `scope`, if one exists.
pub async fn grant_for_scope<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    template: &PermissionTemplate,
    scope: GrantScope,
) -> Result<Option<Grant>, StorageError> {
    let (is_override, client_id, object_id) = scope_columns(&scope);
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM permission_grants \
         WHERE template_id = $1 AND is_override = $2 \
         AND subject_client_id IS NOT DISTINCT FROM $3 \
         AND subject_object_id IS NOT DISTINCT FROM $4",
    )
    .bind(template.id.value())
    .bind(is_override)
    .bind(client_id)
    .bind(object_id)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;

    Ok(row.map(|(id,)| Grant::new(id, template, scope)))
}

pub async fn insert_actor_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    grant: GrantId,
    actor: ActorId,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO actor_grants (actor_id, grant_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(actor.value())
    .bind(grant.value())
    .execute(executor)
    .await
    .map_err(|e| to_write_error(e, &format!("grant {grant} or actor {actor}")))?;
    Ok(())
}

pub async fn insert_organization_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    grant: GrantId,
    organization: OrganizationId,
) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO organization_grants (organization_id, grant_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(organization.value())
    .bind(grant.value())
    .execute(executor)
    .await
    .map_err(|e| to_write_error(e, &format!("grant {grant} or organization {organization}")))?;
    Ok(())
}

pub async fn upsert_visibility<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: CompositeId,
    state: &VisibilityState,
) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO subject_visibility (client_id, object_id, state)
        VALUES ($1, $2, $3)
        ON CONFLICT (client_id, object_id) DO UPDATE SET state = EXCLUDED.state
        "#,
    )
    .bind(id.client_id)
    .bind(id.object_id)
    .bind(state.as_str())
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(())
}
