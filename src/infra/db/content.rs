use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ContentRepo, RepoError},
    domain::entities::{ItemId, ItemStamp, RawRow, TermRecord},
    domain::types::ContentStatus,
};

use super::{PostgresRepositories, map_sqlx_error};

/// Term tree with each term's distance from its root. Bounded so a
/// corrupted parent cycle cannot recurse forever.
const TERM_TREE_CTE: &str = r#"
    WITH RECURSIVE term_tree AS (
        SELECT id, slug, name, parent_id, 0 AS depth
        FROM terms
        WHERE parent_id IS NULL
        UNION ALL
        SELECT t.id, t.slug, t.name, t.parent_id, tt.depth + 1
        FROM terms t
        INNER JOIN term_tree tt ON t.parent_id = tt.id
        WHERE tt.depth < 64
    )
"#;

#[derive(sqlx::FromRow)]
struct StampRow {
    id: i64,
    created_at: OffsetDateTime,
}

impl From<StampRow> for ItemStamp {
    fn from(row: StampRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: i64,
    title: Option<String>,
    slug: Option<String>,
    created_at: OffsetDateTime,
    modified_at: Option<OffsetDateTime>,
}

impl From<ContentRow> for RawRow {
    fn from(row: ContentRow) -> Self {
        Self {
            id: Some(row.id),
            title: row.title,
            slug: row.slug,
            created_at: Some(row.created_at),
            modified_at: row.modified_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TermRow {
    id: i64,
    slug: String,
    name: String,
    parent_id: Option<i64>,
    depth: i32,
}

impl From<TermRow> for TermRecord {
    fn from(row: TermRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            parent_id: row.parent_id,
            depth: row.depth,
        }
    }
}

#[async_trait]
impl ContentRepo for PostgresRepositories {
    async fn term_item_stamps(
        &self,
        term_slug: &str,
        content_types: &[String],
    ) -> Result<Vec<ItemStamp>, RepoError> {
        let rows = sqlx::query_as::<_, StampRow>(
            r#"
            SELECT ci.id, ci.created_at
            FROM content_items ci
            INNER JOIN item_terms it ON it.item_id = ci.id
            INNER JOIN terms t ON t.id = it.term_id
            WHERE t.slug = $1
              AND ci.status = $2
              AND ci.content_type = ANY($3)
            ORDER BY ci.created_at DESC, ci.id DESC
            "#,
        )
        .bind(term_slug)
        .bind(ContentStatus::Published.as_str())
        .bind(content_types)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ItemStamp::from).collect())
    }

    async fn type_item_stamps(&self, content_type: &str) -> Result<Vec<ItemStamp>, RepoError> {
        let rows = sqlx::query_as::<_, StampRow>(
            r#"
            SELECT id, created_at
            FROM content_items
            WHERE content_type = $1
              AND status = $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(content_type)
        .bind(ContentStatus::Published.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ItemStamp::from).collect())
    }

    async fn fetch_rows(&self, ids: &[ItemId]) -> Result<Vec<RawRow>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ContentRow>(
            r#"
            SELECT id, title, slug, created_at, modified_at
            FROM content_items
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(RawRow::from).collect())
    }

    async fn list_terms(&self) -> Result<Vec<TermRecord>, RepoError> {
        let sql = format!(
            "{TERM_TREE_CTE} SELECT id, slug, name, parent_id, depth FROM term_tree ORDER BY LOWER(name), slug"
        );
        let rows = sqlx::query_as::<_, TermRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TermRecord::from).collect())
    }

    async fn find_term(&self, slug: &str) -> Result<Option<TermRecord>, RepoError> {
        let sql = format!(
            "{TERM_TREE_CTE} SELECT id, slug, name, parent_id, depth FROM term_tree WHERE slug = $1"
        );
        let row = sqlx::query_as::<_, TermRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(TermRecord::from))
    }

    async fn terms_for_item(&self, item_id: ItemId) -> Result<Vec<TermRecord>, RepoError> {
        let sql = format!(
            r#"{TERM_TREE_CTE}
            SELECT tt.id, tt.slug, tt.name, tt.parent_id, tt.depth
            FROM term_tree tt
            INNER JOIN item_terms it ON it.term_id = tt.id
            WHERE it.item_id = $1
            ORDER BY tt.depth DESC, tt.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, TermRow>(&sql)
            .bind(item_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TermRecord::from).collect())
    }
}
