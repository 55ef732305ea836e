use sqlx::PgPool;

/// Statements run in order; each is idempotent. Nothing here needs a server
/// newer than PostgreSQL 11.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS actors (
        id          BIGSERIAL PRIMARY KEY,
        active      BOOLEAN NOT NULL DEFAULT TRUE,
        superuser   BOOLEAN NOT NULL DEFAULT FALSE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id          BIGSERIAL PRIMARY KEY,
        actor_id    BIGINT NOT NULL REFERENCES actors(id),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_members (
        organization_id BIGINT NOT NULL REFERENCES organizations(id),
        actor_id        BIGINT NOT NULL REFERENCES actors(id),
        PRIMARY KEY (organization_id, actor_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permission_templates (
        id                  BIGSERIAL PRIMARY KEY,
        subject             TEXT NOT NULL,
        action              TEXT NOT NULL,
        dictionary_default  BOOLEAN NOT NULL DEFAULT FALSE,
        perspective_default BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (subject, action)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permission_grants (
        id                  BIGSERIAL PRIMARY KEY,
        template_id         BIGINT NOT NULL REFERENCES permission_templates(id),
        is_override         BOOLEAN NOT NULL DEFAULT FALSE,
        subject_client_id   BIGINT,
        subject_object_id   BIGINT,
        CONSTRAINT exclusive_scope CHECK (
            (is_override AND subject_client_id IS NULL AND subject_object_id IS NULL)
            OR (NOT is_override AND subject_object_id IS NOT NULL)
        )
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS actor_grants (
        actor_id    BIGINT NOT NULL REFERENCES actors(id),
        grant_id    BIGINT NOT NULL REFERENCES permission_grants(id),
        PRIMARY KEY (actor_id, grant_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS organization_grants (
        organization_id BIGINT NOT NULL REFERENCES organizations(id),
        grant_id        BIGINT NOT NULL REFERENCES permission_grants(id),
        PRIMARY KEY (organization_id, grant_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS subject_visibility (
        client_id   BIGINT NOT NULL,
        object_id   BIGINT NOT NULL,
        state       TEXT NOT NULL,
        PRIMARY KEY (client_id, object_id)
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_grants_unique_scope
    ON permission_grants (
        template_id,
        is_override,
        COALESCE(subject_client_id, -1),
        COALESCE(subject_object_id, -1)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_members_actor
    ON organization_members (actor_id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_grants_scope
    ON permission_grants (template_id, subject_object_id, subject_client_id)
    "#,
];

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(statements = MIGRATIONS.len(), "migrations applied");
    Ok(())
}
