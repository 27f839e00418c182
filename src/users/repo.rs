use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::users::repo_types::{Page, Role, User, UserDraft, UserFilter, UserWithRoles};

/// Persistence for users and their role assignments.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn paginate(
        &self,
        filter: &UserFilter,
        page: i64,
        per_page: i64,
    ) -> anyhow::Result<Page<UserWithRoles>>;
    async fn find(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn roles_of(&self, user_id: i64) -> anyhow::Result<Vec<Role>>;
    /// All roles ordered by name.
    async fn list_roles(&self) -> anyhow::Result<Vec<Role>>;
    /// Insert or update `draft`, then make its role set exactly `role_ids`.
    /// Both writes commit together or not at all.
    async fn save_with_roles(&self, draft: &UserDraft, role_ids: &[i64]) -> anyhow::Result<User>;
    /// Remove every role of the user, then the user itself, in one transaction.
    async fn delete_with_roles(&self, id: i64) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, fullname, email, password, status, created_at, updated_at";

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn like_pattern(keyword: &str) -> String {
    let escaped = keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Replace the role set of `user_id` with `role_ids`.
async fn sync_roles_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    role_ids: &[i64],
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        DELETE FROM user_role
         WHERE user_id = $1
           AND NOT (role_id = ANY($2))
        "#,
    )
    .bind(user_id)
    .bind(role_ids)
    .execute(&mut **tx)
    .await
    .context("detach roles")?;

    sqlx::query(
        r#"
        INSERT INTO user_role (user_id, role_id)
        SELECT $1, r FROM UNNEST($2::BIGINT[]) AS r
        ON CONFLICT (user_id, role_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(role_ids)
    .execute(&mut **tx)
    .await
    .context("attach roles")?;

    Ok(())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn paginate(
        &self,
        filter: &UserFilter,
        page: i64,
        per_page: i64,
    ) -> anyhow::Result<Page<UserWithRoles>> {
        let keyword = filter.keyword.trim();
        let pattern = like_pattern(keyword);
        let where_clause = r#"
            WHERE ($1 = '' OR u.fullname ILIKE $2 OR u.email ILIKE $2)
              AND (CARDINALITY($3::BIGINT[]) = 0 OR EXISTS (
                    SELECT 1 FROM user_role ur
                     WHERE ur.user_id = u.id AND ur.role_id = ANY($3)))
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM users u {}",
            where_clause
        ))
        .bind(keyword)
        .bind(&pattern)
        .bind(&filter.role_ids)
        .fetch_one(&self.db)
        .await
        .context("count users")?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT u.id, u.fullname, u.email, u.password, u.status, u.created_at, u.updated_at
               FROM users u {}
              ORDER BY u.id
              LIMIT $4 OFFSET $5",
            where_clause
        ))
        .bind(keyword)
        .bind(&pattern)
        .bind(&filter.role_ids)
        .bind(per_page)
        .bind((page - 1).saturating_mul(per_page))
        .fetch_all(&self.db)
        .await
        .context("list users")?;

        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let rows = sqlx::query_as::<_, (i64, i64, String)>(
            r#"
            SELECT ur.user_id, r.id, r.name
              FROM user_role ur
              JOIN roles r ON r.id = ur.role_id
             WHERE ur.user_id = ANY($1)
             ORDER BY r.name
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await
        .context("list roles of users")?;

        let mut by_user: HashMap<i64, Vec<Role>> = HashMap::new();
        for (user_id, id, name) in rows {
            by_user.entry(user_id).or_default().push(Role { id, name });
        }

        let items = users
            .into_iter()
            .map(|user| UserWithRoles {
                roles: by_user.remove(&user.id).unwrap_or_default(),
                user,
            })
            .collect();

        Ok(Page::new(items, total, page, per_page))
    }

    async fn find(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn roles_of(&self, user_id: i64) -> anyhow::Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
              FROM roles r
              JOIN user_role ur ON ur.role_id = r.id
             WHERE ur.user_id = $1
             ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("roles of user")?;
        Ok(roles)
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY name")
            .fetch_all(&self.db)
            .await
            .context("list roles")?;
        Ok(roles)
    }

    async fn save_with_roles(&self, draft: &UserDraft, role_ids: &[i64]) -> anyhow::Result<User> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let user = match draft.id {
            None => sqlx::query_as::<_, User>(&format!(
                "INSERT INTO users (fullname, email, password, status)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(&draft.fullname)
            .bind(&draft.email)
            .bind(&draft.password)
            .bind(draft.status)
            .fetch_one(&mut *tx)
            .await
            .context("insert user")?,
            Some(id) => sqlx::query_as::<_, User>(&format!(
                "UPDATE users
                    SET fullname = $2, email = $3, password = $4, status = $5, updated_at = NOW()
                  WHERE id = $1
                 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(id)
            .bind(&draft.fullname)
            .bind(&draft.email)
            .bind(&draft.password)
            .bind(draft.status)
            .fetch_one(&mut *tx)
            .await
            .context("update user")?,
        };

        sync_roles_tx(&mut tx, user.id, role_ids).await?;
        tx.commit().await.context("commit tx")?;
        Ok(user)
    }

    async fn delete_with_roles(&self, id: i64) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sync_roles_tx(&mut tx, id, &[]).await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("delete user")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }
}
