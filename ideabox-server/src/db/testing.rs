//! Fixtures for database tests
//!
//! Every fixture uses random names so tests can share one database.

use sqlx::PgPool;
use uuid::Uuid;

use super::repos::*;
use crate::models::{BoardName, BoardSlug, Email, HexColor, PostBody, PostTitle, Role, StatusName, UserName};

/// Pool against `DATABASE_URL` with the schema in place.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = super::create_pool(&url).await.expect("pool creation failed");
    super::migrations::run(&pool).await.expect("migrations failed");
    pool
}

fn tag() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub async fn user(pool: &PgPool) -> User {
    user_with_role(pool, Role::User).await.0
}

pub async fn user_with_role(pool: &PgPool, role: Role) -> (User, String) {
    let tag = tag();
    UserRepo::new(pool)
        .create(
            UserName::new(&format!("user {tag}")).unwrap(),
            Email::new(&format!("{tag}@example.com")).unwrap(),
            role,
        )
        .await
        .expect("create user")
}

pub async fn board(pool: &PgPool) -> Board {
    let tag = tag();
    BoardRepo::new(pool)
        .create(NewBoard {
            name: BoardName::new(&format!("Board {tag}")).unwrap(),
            slug: BoardSlug::new(&format!("board-{tag}")).unwrap(),
            description: String::new(),
            allow_posts: true,
        })
        .await
        .expect("create board")
}

pub async fn status(pool: &PgPool) -> Status {
    StatusRepo::new(pool)
        .create(NewStatus {
            name: StatusName::new(&format!("Status {}", tag())).unwrap(),
            color: HexColor::new("#1a7f37").unwrap(),
            in_roadmap: true,
            is_default: false,
            sort_order: 50,
        })
        .await
        .expect("create status")
}

pub async fn post(pool: &PgPool, board_id: Uuid, user_id: Uuid, title: &str) -> Post {
    PostRepo::new(pool)
        .create(NewPost {
            board_id,
            user_id,
            title: PostTitle::new(title).unwrap(),
            body: PostBody::new("").unwrap(),
        })
        .await
        .expect("create post")
}

pub async fn provider(pool: &PgPool) -> Provider {
    IntegrationRepo::new(pool)
        .create_provider(NewProvider {
            kind: "github".to_string(),
            name: format!("GitHub {}", tag()),
            client_id: "Iv1.test".to_string(),
            client_secret: "secret".to_string(),
            auto_close_status_id: None,
        })
        .await
        .expect("create provider")
}

pub async fn repository(pool: &PgPool) -> TrackedRepository {
    let provider = provider(pool).await;
    IntegrationRepo::new(pool)
        .add_repository(provider.id, &format!("acme/repo-{}", tag()), 1, None, "hook-secret")
        .await
        .expect("add repository")
}
