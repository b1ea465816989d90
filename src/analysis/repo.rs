use anyhow::Context;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One stored analysis. Immutable once written.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image: Vec<u8>,
    pub content_type: String,
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub prediction: String,
    pub confidence: f64,
    pub image_type: String,
    pub created_at: OffsetDateTime,
}

/// Insert payload; `id` doubles as the inference job id.
#[derive(Debug)]
pub struct NewHistoryRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image: Vec<u8>,
    pub content_type: String,
    pub original_name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub prediction: String,
    pub confidence: f64,
    pub image_type: String,
}

pub async fn insert(db: &PgPool, rec: NewHistoryRecord) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO history
            (id, user_id, image, content_type, original_name,
             description, location, prediction, confidence, image_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(rec.id)
    .bind(rec.user_id)
    .bind(rec.image)
    .bind(rec.content_type)
    .bind(rec.original_name)
    .bind(rec.description)
    .bind(rec.location)
    .bind(rec.prediction)
    .bind(rec.confidence)
    .bind(rec.image_type)
    .execute(db)
    .await
    .context("insert history record")?;
    Ok(())
}

pub async fn list_page(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<HistoryRecord>> {
    let rows = sqlx::query_as::<_, HistoryRecord>(
        r#"
        SELECT id, user_id, image, content_type, original_name,
               description, location, prediction, confidence, image_type, created_at
          FROM history
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list history page")?;
    Ok(rows)
}

pub async fn count_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let total =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM history WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await
            .context("count history")?;
    Ok(total)
}

/// Ownership check for the report proxies.
pub async fn is_owned_by(db: &PgPool, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
    let found = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM history WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("check history ownership")?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::User;
    use sqlx::postgres::PgPoolOptions;

    // Needs a running Postgres; ignored unless run explicitly with
    // DATABASE_URL pointing at a scratch database.
    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .ok()?;
        sqlx::migrate!("./migrations").run(&pool).await.ok()?;
        Some(pool)
    }

    fn record_for(user_id: Uuid) -> NewHistoryRecord {
        NewHistoryRecord {
            id: Uuid::new_v4(),
            user_id,
            image: vec![0xff, 0xd8],
            content_type: "image/jpeg".into(),
            original_name: Some("scan.jpg".into()),
            description: None,
            location: None,
            prediction: "benign".into(),
            confidence: 0.5,
            image_type: "Skin".into(),
        }
    }

    #[tokio::test]
    #[ignore = "needs Postgres via DATABASE_URL"]
    async fn partial_last_page_and_total_count() {
        let Some(pool) = test_pool().await else { return };
        let email = format!("history-{}@example.com", Uuid::new_v4());
        let user = User::create(&pool, "Ada", &email, "hash").await.expect("create");

        let mut ids = Vec::new();
        for _ in 0..5 {
            let rec = record_for(user.id);
            ids.push(rec.id);
            insert(&pool, rec).await.expect("insert");
        }

        // Page size 4 over 5 records: a full page, then the remainder
        let first = list_page(&pool, user.id, 4, 0).await.expect("page 1");
        let second = list_page(&pool, user.id, 4, 4).await.expect("page 2");
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 1);
        assert!(first.iter().all(|r| !second.iter().any(|s| s.id == r.id)));

        let mut seen: Vec<Uuid> = first.iter().chain(&second).map(|r| r.id).collect();
        seen.sort();
        ids.sort();
        assert_eq!(seen, ids);

        assert_eq!(count_for_user(&pool, user.id).await.expect("count"), 5);
        // Other users' records never leak into the page
        assert!(list_page(&pool, Uuid::new_v4(), 4, 0).await.expect("empty").is_empty());
    }
}
