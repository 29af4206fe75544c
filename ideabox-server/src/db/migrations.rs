//! Schema creation
//!
//! Every statement is idempotent, so this runs on each `serve` start as well
//! as from `ideabox migrate`.

use sqlx::PgPool;

use super::DbError;

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
            api_token_hash TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "boards",
        r#"
        CREATE TABLE IF NOT EXISTS boards (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            allow_posts BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "statuses",
        r#"
        CREATE TABLE IF NOT EXISTS statuses (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT '#6e7781',
            in_roadmap BOOLEAN NOT NULL DEFAULT FALSE,
            is_default BOOLEAN NOT NULL DEFAULT FALSE,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "posts",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            board_id UUID NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            status_id UUID REFERENCES statuses(id) ON DELETE SET NULL,
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            vote INTEGER NOT NULL DEFAULT 0,
            comments INTEGER NOT NULL DEFAULT 0,
            merged_into_post_id UUID REFERENCES posts(id) ON DELETE SET NULL,
            merged_by_user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            merged_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (board_id, slug)
        )
        "#,
    ),
    (
        "votes",
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            origin_post_id UUID REFERENCES posts(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (post_id, user_id)
        )
        "#,
    ),
    (
        "comments",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id UUID REFERENCES users(id) ON DELETE SET NULL,
            parent_id UUID REFERENCES comments(id) ON DELETE SET NULL,
            body TEXT NOT NULL DEFAULT '',
            status_id UUID REFERENCES statuses(id) ON DELETE SET NULL,
            origin_post_id UUID REFERENCES posts(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "post_subscriptions",
        r#"
        CREATE TABLE IF NOT EXISTS post_subscriptions (
            post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (post_id, user_id)
        )
        "#,
    ),
    (
        "settings",
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "integration_providers",
        r#"
        CREATE TABLE IF NOT EXISTS integration_providers (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            client_id TEXT NOT NULL,
            client_secret TEXT NOT NULL,
            access_token TEXT,
            token_scope TEXT,
            oauth_state TEXT UNIQUE,
            connected_at TIMESTAMPTZ,
            auto_close_status_id UUID REFERENCES statuses(id) ON DELETE SET NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "integration_repositories",
        r#"
        CREATE TABLE IF NOT EXISTS integration_repositories (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            provider_id UUID NOT NULL REFERENCES integration_providers(id) ON DELETE CASCADE,
            full_name TEXT NOT NULL,
            external_id BIGINT NOT NULL,
            webhook_id BIGINT,
            webhook_secret TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (provider_id, full_name)
        )
        "#,
    ),
    (
        "post_integration_links",
        r#"
        CREATE TABLE IF NOT EXISTS post_integration_links (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            repository_id UUID NOT NULL REFERENCES integration_repositories(id) ON DELETE CASCADE,
            issue_number BIGINT NOT NULL,
            issue_title TEXT NOT NULL,
            issue_url TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (post_id, repository_id, issue_number)
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_posts_board ON posts(board_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_merged_into ON posts(merged_into_post_id) WHERE merged_into_post_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_votes_post_created ON votes(post_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_votes_origin ON votes(origin_post_id) WHERE origin_post_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_comments_origin ON comments(origin_post_id) WHERE origin_post_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS idx_repos_full_name ON integration_repositories(full_name)",
    "CREATE INDEX IF NOT EXISTS idx_links_issue ON post_integration_links(repository_id, issue_number)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_statuses_single_default ON statuses(is_default) WHERE is_default",
];

/// Statuses created on an empty install: (name, color, in_roadmap, is_default)
const DEFAULT_STATUSES: &[(&str, &str, bool, bool)] = &[
    ("Open", "#6e7781", false, true),
    ("Under Review", "#9a6700", true, false),
    ("Planned", "#0969da", true, false),
    ("In Progress", "#8250df", true, false),
    ("Completed", "#1a7f37", true, false),
    ("Closed", "#cf222e", false, false),
];

/// Create all tables and indexes.
pub async fn run(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running migrations...");

    for (table, ddl) in TABLES {
        sqlx::query(*ddl).execute(pool).await?;
        tracing::debug!(table = *table, "table ready");
    }
    create_indexes(pool).await?;

    tracing::info!(tables = TABLES.len(), "Migrations complete");
    Ok(())
}

async fn create_indexes(pool: &PgPool) -> Result<(), DbError> {
    for ddl in INDEXES {
        sqlx::query(*ddl).execute(pool).await?;
    }
    Ok(())
}

/// Insert the default status set when no statuses exist yet.
///
/// Returns the number of statuses created.
pub async fn seed_statuses(pool: &PgPool) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM statuses")
        .fetch_one(&mut *tx)
        .await?;
    if existing > 0 {
        return Ok(0);
    }

    for (order, (name, color, in_roadmap, is_default)) in DEFAULT_STATUSES.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO statuses (name, color, in_roadmap, is_default, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*name)
        .bind(*color)
        .bind(*in_roadmap)
        .bind(*is_default)
        .bind(order as i32)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!(count = DEFAULT_STATUSES.len(), "Seeded default statuses");
    Ok(DEFAULT_STATUSES.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_default_status_seeded() {
        let defaults = DEFAULT_STATUSES.iter().filter(|s| s.3).count();
        assert_eq!(defaults, 1);
    }

    #[test]
    fn tables_created_before_their_references() {
        let order: Vec<&str> = TABLES.iter().map(|(t, _)| *t).collect();
        let pos = |t: &str| order.iter().position(|x| *x == t).unwrap();
        assert!(pos("users") < pos("posts"));
        assert!(pos("boards") < pos("posts"));
        assert!(pos("statuses") < pos("posts"));
        assert!(pos("posts") < pos("votes"));
        assert!(pos("integration_providers") < pos("integration_repositories"));
        assert!(pos("integration_repositories") < pos("post_integration_links"));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_are_idempotent() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool");
        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");
    }
}
