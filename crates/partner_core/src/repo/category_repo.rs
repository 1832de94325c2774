//! Partner category repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Child listing is deterministic: `name ASC, seq ASC`.
//! - `set_partner_categories` replaces the whole link set atomically.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::category::{CategoryId, PartnerCategory};
use crate::model::partner::PartnerId;
use crate::repo::{bool_to_int, int_to_bool, like_contains, parse_uuid, schema_version, table_exists};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CATEGORY_SELECT_SQL: &str = "SELECT uuid, name, color, parent_uuid, active
FROM partner_categories";

/// Result type used by category repository operations.
pub type CategoryRepoResult<T> = Result<T, CategoryRepoError>;

/// Errors from category repository operations.
#[derive(Debug)]
pub enum CategoryRepoError {
    Db(DbError),
    CategoryNotFound(CategoryId),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for CategoryRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::CategoryNotFound(id) => write!(f, "partner category not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "category repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "category repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid partner category data: {message}"),
        }
    }
}

impl Error for CategoryRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CategoryRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for partner categories.
pub trait CategoryRepository {
    fn insert_category(&self, category: &PartnerCategory) -> CategoryRepoResult<()>;
    fn get_category(&self, id: CategoryId) -> CategoryRepoResult<Option<PartnerCategory>>;
    /// Persists name, color, parent and active flag.
    fn update_category(&self, category: &PartnerCategory) -> CategoryRepoResult<()>;
    fn list_children(&self, parent_id: Option<CategoryId>) -> CategoryRepoResult<Vec<PartnerCategory>>;
    /// Active categories whose own name contains `term`.
    fn search_by_name(&self, term: &str, limit: u32) -> CategoryRepoResult<Vec<PartnerCategory>>;
    /// Replaces every category link of one partner.
    fn set_partner_categories(
        &self,
        partner_id: PartnerId,
        category_ids: &[CategoryId],
    ) -> CategoryRepoResult<()>;
    fn list_partner_categories(&self, partner_id: PartnerId) -> CategoryRepoResult<Vec<PartnerCategory>>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CategoryRepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = schema_version(conn)?;
        if actual_version != expected_version {
            return Err(CategoryRepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        for table in ["partner_categories", "partner_category_links"] {
            if !table_exists(conn, table)? {
                return Err(CategoryRepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    fn query_categories(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> CategoryRepoResult<Vec<PartnerCategory>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(parse_category_row(row)?);
        }
        Ok(categories)
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn insert_category(&self, category: &PartnerCategory) -> CategoryRepoResult<()> {
        self.conn.execute(
            "INSERT INTO partner_categories (uuid, name, color, parent_uuid, active)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                category.id.to_string(),
                category.name.as_str(),
                category.color,
                category.parent_id.map(|id| id.to_string()),
                bool_to_int(category.active),
            ],
        )?;
        Ok(())
    }

    fn get_category(&self, id: CategoryId) -> CategoryRepoResult<Option<PartnerCategory>> {
        let mut categories = self.query_categories(
            &format!("{CATEGORY_SELECT_SQL} WHERE uuid = ?1;"),
            [id.to_string()],
        )?;
        Ok(categories.pop())
    }

    fn update_category(&self, category: &PartnerCategory) -> CategoryRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE partner_categories
             SET name = ?2,
                 color = ?3,
                 parent_uuid = ?4,
                 active = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                category.id.to_string(),
                category.name.as_str(),
                category.color,
                category.parent_id.map(|id| id.to_string()),
                bool_to_int(category.active),
            ],
        )?;
        if changed == 0 {
            return Err(CategoryRepoError::CategoryNotFound(category.id));
        }
        Ok(())
    }

    fn list_children(&self, parent_id: Option<CategoryId>) -> CategoryRepoResult<Vec<PartnerCategory>> {
        match parent_id {
            Some(parent_id) => self.query_categories(
                &format!(
                    "{CATEGORY_SELECT_SQL}
                     WHERE parent_uuid = ?1 AND active = 1
                     ORDER BY name ASC, seq ASC;"
                ),
                [parent_id.to_string()],
            ),
            None => self.query_categories(
                &format!(
                    "{CATEGORY_SELECT_SQL}
                     WHERE parent_uuid IS NULL AND active = 1
                     ORDER BY name ASC, seq ASC;"
                ),
                [],
            ),
        }
    }

    fn search_by_name(&self, term: &str, limit: u32) -> CategoryRepoResult<Vec<PartnerCategory>> {
        self.query_categories(
            &format!(
                "{CATEGORY_SELECT_SQL}
                 WHERE active = 1
                   AND name LIKE ?1 ESCAPE '\\'
                 ORDER BY name ASC, seq ASC
                 LIMIT ?2;"
            ),
            params![like_contains(term), i64::from(limit)],
        )
    }

    fn set_partner_categories(
        &self,
        partner_id: PartnerId,
        category_ids: &[CategoryId],
    ) -> CategoryRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM partner_category_links WHERE partner_uuid = ?1;",
            [partner_id.to_string()],
        )?;
        for category_id in category_ids {
            tx.execute(
                "INSERT OR IGNORE INTO partner_category_links (partner_uuid, category_uuid)
                 VALUES (?1, ?2);",
                params![partner_id.to_string(), category_id.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn list_partner_categories(&self, partner_id: PartnerId) -> CategoryRepoResult<Vec<PartnerCategory>> {
        self.query_categories(
            "SELECT c.uuid AS uuid, c.name AS name, c.color AS color,
                    c.parent_uuid AS parent_uuid, c.active AS active
             FROM partner_categories c
             INNER JOIN partner_category_links l ON l.category_uuid = c.uuid
             WHERE l.partner_uuid = ?1
             ORDER BY c.name ASC, c.seq ASC;",
            [partner_id.to_string()],
        )
    }
}

fn parse_category_row(row: &Row<'_>) -> CategoryRepoResult<PartnerCategory> {
    let id_text: String = row.get("uuid")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "partner_categories.parent_uuid"))
        .transpose()
        .map_err(CategoryRepoError::InvalidData)?;

    Ok(PartnerCategory {
        id: parse_uuid(&id_text, "partner_categories.uuid").map_err(CategoryRepoError::InvalidData)?,
        name: row.get("name")?,
        color: row.get("color")?,
        parent_id,
        active: int_to_bool(row.get("active")?, "partner_categories.active")
            .map_err(CategoryRepoError::InvalidData)?,
    })
}
