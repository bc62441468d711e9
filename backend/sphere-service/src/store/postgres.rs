use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{DocumentStore, EdgeSide, SetMutation, StoreError, StoreResult};
use crate::config::DatabaseConfig;
use crate::domain::{Comment, EntityKind, LikeOutcome, Post, PostContent, ProfileUpdate, User};

/// PostgreSQL-backed store. Documents map to rows; id sets map to `UUID[]`
/// columns, mutated with a single `UPDATE ... RETURNING` per call.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    profile_picture: Option<String>,
    followers: Vec<Uuid>,
    following: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            profile_picture: row.profile_picture,
            followers: row.followers,
            following: row.following,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    content_kind: String,
    content_data: String,
    comment_ids: Vec<Uuid>,
    like_user_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let content = PostContent::from_parts(&row.content_kind, row.content_data).ok_or_else(
            || StoreError::Corrupt {
                id: row.id,
                reason: format!("unknown content kind `{}`", row.content_kind),
            },
        )?;
        Ok(Post {
            id: row.id,
            author_id: row.author_id,
            content,
            comment_ids: row.comment_ids,
            like_user_ids: row.like_user_ids,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    text: String,
    like_user_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            like_user_ids: row.like_user_ids,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, profile_picture, followers, following, created_at";
const POST_COLUMNS: &str =
    "id, author_id, content_kind, content_data, comment_ids, like_user_ids, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, author_id, text, like_user_ids, created_at";

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some("users_username_key") => "username",
                Some("users_email_key") => "email",
                _ => "id",
            };
            return StoreError::Conflict {
                field: field.to_string(),
            };
        }
    }
    StoreError::Database(err)
}

fn engagement_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Post => "posts",
        EntityKind::Comment => "comments",
    }
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        // Statement caching off for PgBouncer transaction mode
        let options = PgConnectOptions::from_str(&config.url)?.statement_cache_capacity(0);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_with(options)
            .await?;

        info!(
            max_connections = config.max_connections,
            "PostgreSQL pool created"
        );
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn edge_size(&self, user_id: Uuid, side: EdgeSide) -> StoreResult<Option<SetMutation>> {
        let sql = format!(
            "SELECT cardinality({col}) FROM users WHERE id = $1",
            col = side.as_str()
        );
        let size: Option<i32> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(size.map(|s| SetMutation {
            changed: false,
            size: s as usize,
        }))
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, profile_picture, followers, following, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.profile_picture)
        .bind(&user.followers)
        .bind(&user.following)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at, id", USER_COLUMNS);
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                profile_picture = COALESCE($4, profile_picture)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.username)
            .bind(&update.email)
            .bind(&update.profile_picture)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        Ok(row.map(User::from))
    }

    async fn add_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        let sql = format!(
            r#"
            UPDATE users
            SET {col} = array_append({col}, $2)
            WHERE id = $1 AND NOT ($2 = ANY({col}))
            RETURNING cardinality({col})
            "#,
            col = side.as_str()
        );
        let size: Option<i32> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(member)
            .fetch_optional(&self.pool)
            .await?;
        match size {
            Some(s) => Ok(Some(SetMutation {
                changed: true,
                size: s as usize,
            })),
            None => self.edge_size(user_id, side).await,
        }
    }

    async fn remove_edge(
        &self,
        user_id: Uuid,
        side: EdgeSide,
        member: Uuid,
    ) -> StoreResult<Option<SetMutation>> {
        let sql = format!(
            r#"
            UPDATE users
            SET {col} = array_remove({col}, $2)
            WHERE id = $1 AND $2 = ANY({col})
            RETURNING cardinality({col})
            "#,
            col = side.as_str()
        );
        let size: Option<i32> = sqlx::query_scalar(&sql)
            .bind(user_id)
            .bind(member)
            .fetch_optional(&self.pool)
            .await?;
        match size {
            Some(s) => Ok(Some(SetMutation {
                changed: true,
                size: s as usize,
            })),
            None => self.edge_size(user_id, side).await,
        }
    }

    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, content_kind, content_data, comment_ids, like_user_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(post.content.kind())
        .bind(post.content.data())
        .bind(&post.comment_ids)
        .bind(&post.like_user_ids)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Post::try_from).transpose()
    }

    async fn posts_by_authors(&self, author_ids: &[Uuid]) -> StoreResult<Vec<Post>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM posts WHERE author_id = ANY($1)", POST_COLUMNS);
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(author_ids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Post::try_from).collect()
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let sql = format!("DELETE FROM posts WHERE id = $1 RETURNING {}", POST_COLUMNS);
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Post::try_from).transpose()
    }

    async fn push_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool> {
        let affected = sqlx::query(
            "UPDATE posts SET comment_ids = array_append(comment_ids, $2) WHERE id = $1",
        )
        .bind(post_id)
        .bind(comment_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn pull_comment_ref(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<bool> {
        let affected = sqlx::query(
            "UPDATE posts SET comment_ids = array_remove(comment_ids, $2) WHERE id = $1",
        )
        .bind(post_id)
        .bind(comment_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn dangling_comment_refs(&self) -> StoreResult<Vec<(Uuid, Uuid)>> {
        let refs = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT p.id, r.comment_id
            FROM posts p
            CROSS JOIN LATERAL unnest(p.comment_ids) AS r(comment_id)
            WHERE NOT EXISTS (SELECT 1 FROM comments c WHERE c.id = r.comment_id)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(refs)
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, text, like_user_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(&comment.like_user_ids)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let sql = format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS);
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    async fn get_comments(&self, ids: &[Uuid]) -> StoreResult<Vec<Comment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM comments WHERE id = ANY($1)", COMMENT_COLUMNS);
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn comments_for_post(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM comments WHERE post_id = $1 ORDER BY created_at, id",
            COMMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let sql = format!("DELETE FROM comments WHERE id = $1 RETURNING {}", COMMENT_COLUMNS);
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Comment::from))
    }

    async fn delete_comments_for_post(&self, post_id: Uuid, limit: usize) -> StoreResult<usize> {
        let affected = sqlx::query(
            r#"
            DELETE FROM comments
            WHERE id IN (SELECT id FROM comments WHERE post_id = $1 LIMIT $2)
            "#,
        )
        .bind(post_id)
        .bind(limit as i64)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected as usize)
    }

    async fn count_comments_for_post(&self, post_id: Uuid) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn orphaned_comment_post_ids(&self) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT c.post_id
            FROM comments c
            WHERE NOT EXISTS (SELECT 1 FROM posts p WHERE p.id = c.post_id)
            ORDER BY 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn toggle_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<LikeOutcome>> {
        let sql = format!(
            r#"
            UPDATE {table}
            SET like_user_ids = CASE
                WHEN $2 = ANY(like_user_ids) THEN array_remove(like_user_ids, $2)
                ELSE array_append(like_user_ids, $2)
            END
            WHERE id = $1
            RETURNING $2 = ANY(like_user_ids), cardinality(like_user_ids)
            "#,
            table = engagement_table(kind)
        );
        let row: Option<(bool, i32)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(liked, count)| LikeOutcome {
            liked,
            count: count as usize,
        }))
    }

    async fn set_like(
        &self,
        kind: EntityKind,
        id: Uuid,
        user_id: Uuid,
        liked: bool,
    ) -> StoreResult<Option<LikeOutcome>> {
        let sql = format!(
            r#"
            UPDATE {table}
            SET like_user_ids = CASE
                WHEN $3 AND NOT ($2 = ANY(like_user_ids)) THEN array_append(like_user_ids, $2)
                WHEN NOT $3 THEN array_remove(like_user_ids, $2)
                ELSE like_user_ids
            END
            WHERE id = $1
            RETURNING cardinality(like_user_ids)
            "#,
            table = engagement_table(kind)
        );
        let count: Option<i32> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(user_id)
            .bind(liked)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.map(|count| LikeOutcome {
            liked,
            count: count as usize,
        }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
