use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::auth::repo::{User, USER_COLUMNS};
use crate::auth::{Role, UserStatus};

/// 1-based pagination, saturating like the catalog listing does.
fn page_offset(page: i64, limit: i64) -> i64 {
    (page - 1).saturating_mul(limit)
}

fn push_user_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    search: &str,
    status: Option<UserStatus>,
) {
    if !search.is_empty() {
        qb.push(" AND LOWER(name) LIKE ");
        qb.push_bind(format!("%{}%", search.to_lowercase()));
    }
    if let Some(status) = status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
}

/// Paginated user listing with name search and status filter.
pub async fn list(
    db: &PgPool,
    page: i64,
    limit: i64,
    search: &str,
    status: Option<UserStatus>,
) -> anyhow::Result<(Vec<User>, i64)> {
    let mut count_qb =
        QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE 1=1");
    push_user_predicate(&mut count_qb, search, status);
    let total: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {USER_COLUMNS} FROM users WHERE 1=1"
    ));
    push_user_predicate(&mut qb, search, status);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(page_offset(page, limit));

    let users = qb.build_query_as::<User>().fetch_all(db).await?;
    Ok((users, total))
}

/// Partial update of role/name/mail; absent fields keep their value.
pub async fn update_user(
    db: &PgPool,
    id: i32,
    role: Option<Role>,
    name: Option<&str>,
    mail: Option<&str>,
) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
            role = COALESCE($2, role), \
            name = COALESCE($3, name), \
            mail = COALESCE($4, mail) \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(role)
    .bind(name)
    .bind(mail)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn update_status(
    db: &PgPool,
    id: i32,
    status: UserStatus,
) -> anyhow::Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET status = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(db)
    .await?;
    Ok(user)
}

pub async fn delete(db: &PgPool, id: i32) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_one_based_and_saturates() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(i64::MAX, 10), i64::MAX);
    }
}
