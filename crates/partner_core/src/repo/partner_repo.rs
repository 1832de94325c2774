//! Partner store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist partners, countries and country states.
//! - Answer the tree queries the hierarchy services need: children,
//!   descendant search, email/name lookup.
//! - Expose an atomic scope so one logical write and all of its
//!   propagation commit or roll back together.
//!
//! # Invariants
//! - Only active partners are returned by child/descendant queries.
//! - Child order is creation order (`seq ASC`).
//! - Atomic scopes nest (SQLite savepoints).

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::country::{Country, CountryState};
use crate::model::partner::{
    Partner, PartnerId, PartnerType, PartnerValidationError, PartnerValues,
};
use crate::repo::{bool_to_int, int_to_bool, like_contains, parse_uuid, schema_version, table_exists};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PARTNER_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    ref,
    parent_uuid,
    is_company,
    type,
    company_name,
    commercial_partner_uuid,
    commercial_company_name,
    street,
    street2,
    zip,
    city,
    state_uuid,
    country_uuid,
    email,
    phone,
    mobile,
    website,
    function,
    comment,
    lang,
    vat,
    credit_limit,
    customer,
    supplier,
    employee,
    active,
    created_at,
    updated_at
FROM partners";

const SAVEPOINT_NAME: &str = "partner_write";

/// Result type used by partner store operations.
pub type PartnerRepoResult<T> = Result<T, PartnerRepoError>;

/// Errors from partner store operations.
#[derive(Debug)]
pub enum PartnerRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Record rejected by model validation.
    Validation(PartnerValidationError),
    /// Target partner does not exist.
    PartnerNotFound(PartnerId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for PartnerRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::PartnerNotFound(id) => write!(f, "partner not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "partner repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "partner repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted partner data: {message}"),
        }
    }
}

impl Error for PartnerRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PartnerRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PartnerRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PartnerValidationError> for PartnerRepoError {
    fn from(value: PartnerValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Store interface consumed by the hierarchy services.
pub trait PartnerRepository {
    /// Inserts one partner and returns the stored record.
    fn insert_partner(&self, partner: &Partner) -> PartnerRepoResult<Partner>;
    /// Replaces every mutable column of an existing partner.
    fn update_partner(&self, partner: &Partner) -> PartnerRepoResult<()>;
    /// Loads one partner, active or not.
    fn get_partner(&self, id: PartnerId) -> PartnerRepoResult<Option<Partner>>;
    /// Lists active direct children in creation order.
    fn list_children(&self, id: PartnerId) -> PartnerRepoResult<Vec<Partner>>;
    /// Lists ids of active descendants at any depth, optionally by type.
    fn list_descendant_ids(
        &self,
        id: PartnerId,
        partner_type: Option<PartnerType>,
    ) -> PartnerRepoResult<Vec<PartnerId>>;
    /// Finds active partners whose email matches case-insensitively.
    fn find_by_email(&self, email: &str, limit: u32) -> PartnerRepoResult<Vec<Partner>>;
    /// Finds active partners whose name, email or reference contains `term`.
    fn search_partners(&self, term: &str, limit: u32) -> PartnerRepoResult<Vec<Partner>>;
    /// Inserts one country.
    fn insert_country(&self, country: &Country) -> PartnerRepoResult<()>;
    /// Loads one country.
    fn get_country(&self, id: Uuid) -> PartnerRepoResult<Option<Country>>;
    /// Inserts one country state.
    fn insert_state(&self, state: &CountryState) -> PartnerRepoResult<()>;
    /// Loads one country state.
    fn get_state(&self, id: Uuid) -> PartnerRepoResult<Option<CountryState>>;
    /// Opens an atomic scope.
    fn begin_atomic(&self) -> PartnerRepoResult<()>;
    /// Commits the innermost atomic scope.
    fn commit_atomic(&self) -> PartnerRepoResult<()>;
    /// Discards every change of the innermost atomic scope.
    fn rollback_atomic(&self) -> PartnerRepoResult<()>;

    /// Loads one partner or fails with `PartnerNotFound`.
    fn require_partner(&self, id: PartnerId) -> PartnerRepoResult<Partner> {
        self.get_partner(id)?
            .ok_or(PartnerRepoError::PartnerNotFound(id))
    }

    /// Applies `values` to every partner in `ids` and persists them.
    ///
    /// Plain storage write: no cycle check, recompute or synchronization.
    fn write_values(&self, ids: &[PartnerId], values: &PartnerValues) -> PartnerRepoResult<()> {
        for id in ids {
            let mut partner = self.require_partner(*id)?;
            partner.apply(values)?;
            self.update_partner(&partner)?;
        }
        Ok(())
    }
}

/// SQLite-backed partner store.
pub struct SqlitePartnerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePartnerRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PartnerRepoResult<Self> {
        ensure_partner_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PartnerRepository for SqlitePartnerRepository<'_> {
    fn insert_partner(&self, partner: &Partner) -> PartnerRepoResult<Partner> {
        partner.validate()?;

        self.conn.execute(
            "INSERT INTO partners (
                uuid, name, ref, parent_uuid, is_company, type, company_name,
                commercial_partner_uuid, commercial_company_name,
                street, street2, zip, city, state_uuid, country_uuid,
                email, phone, mobile, website, function, comment, lang,
                vat, credit_limit, customer, supplier, employee, active
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9,
                ?10, ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                ?23, ?24, ?25, ?26, ?27, ?28
            );",
            params![
                partner.id.to_string(),
                partner.name.as_str(),
                partner.reference.as_str(),
                partner.parent_id.map(|id| id.to_string()),
                bool_to_int(partner.is_company),
                partner.partner_type.as_str(),
                partner.company_name.as_str(),
                partner.commercial_partner_id.to_string(),
                partner.commercial_company_name.as_str(),
                partner.street.as_str(),
                partner.street2.as_str(),
                partner.zip.as_str(),
                partner.city.as_str(),
                partner.state_id.map(|id| id.to_string()),
                partner.country_id.map(|id| id.to_string()),
                partner.email.as_str(),
                partner.phone.as_str(),
                partner.mobile.as_str(),
                partner.website.as_str(),
                partner.function.as_str(),
                partner.comment.as_str(),
                partner.lang.as_str(),
                partner.vat.as_str(),
                partner.credit_limit,
                bool_to_int(partner.customer),
                bool_to_int(partner.supplier),
                bool_to_int(partner.employee),
                bool_to_int(partner.active),
            ],
        )?;

        self.require_partner(partner.id)
    }

    fn update_partner(&self, partner: &Partner) -> PartnerRepoResult<()> {
        partner.validate()?;

        let changed = self.conn.execute(
            "UPDATE partners
             SET
                name = ?2,
                ref = ?3,
                parent_uuid = ?4,
                is_company = ?5,
                type = ?6,
                company_name = ?7,
                commercial_partner_uuid = ?8,
                commercial_company_name = ?9,
                street = ?10,
                street2 = ?11,
                zip = ?12,
                city = ?13,
                state_uuid = ?14,
                country_uuid = ?15,
                email = ?16,
                phone = ?17,
                mobile = ?18,
                website = ?19,
                function = ?20,
                comment = ?21,
                lang = ?22,
                vat = ?23,
                credit_limit = ?24,
                customer = ?25,
                supplier = ?26,
                employee = ?27,
                active = ?28,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                partner.id.to_string(),
                partner.name.as_str(),
                partner.reference.as_str(),
                partner.parent_id.map(|id| id.to_string()),
                bool_to_int(partner.is_company),
                partner.partner_type.as_str(),
                partner.company_name.as_str(),
                partner.commercial_partner_id.to_string(),
                partner.commercial_company_name.as_str(),
                partner.street.as_str(),
                partner.street2.as_str(),
                partner.zip.as_str(),
                partner.city.as_str(),
                partner.state_id.map(|id| id.to_string()),
                partner.country_id.map(|id| id.to_string()),
                partner.email.as_str(),
                partner.phone.as_str(),
                partner.mobile.as_str(),
                partner.website.as_str(),
                partner.function.as_str(),
                partner.comment.as_str(),
                partner.lang.as_str(),
                partner.vat.as_str(),
                partner.credit_limit,
                bool_to_int(partner.customer),
                bool_to_int(partner.supplier),
                bool_to_int(partner.employee),
                bool_to_int(partner.active),
            ],
        )?;

        if changed == 0 {
            return Err(PartnerRepoError::PartnerNotFound(partner.id));
        }
        Ok(())
    }

    fn get_partner(&self, id: PartnerId) -> PartnerRepoResult<Option<Partner>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARTNER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_partner_row(row)?));
        }
        Ok(None)
    }

    fn list_children(&self, id: PartnerId) -> PartnerRepoResult<Vec<Partner>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARTNER_SELECT_SQL}
             WHERE parent_uuid = ?1
               AND active = 1
             ORDER BY seq ASC;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut children = Vec::new();
        while let Some(row) = rows.next()? {
            children.push(parse_partner_row(row)?);
        }
        Ok(children)
    }

    fn list_descendant_ids(
        &self,
        id: PartnerId,
        partner_type: Option<PartnerType>,
    ) -> PartnerRepoResult<Vec<PartnerId>> {
        let mut stmt = self.conn.prepare(
            "WITH RECURSIVE subtree(uuid) AS (
                SELECT uuid
                FROM partners
                WHERE parent_uuid = ?1
                  AND active = 1
                UNION
                SELECT child.uuid
                FROM partners child
                INNER JOIN subtree parent ON child.parent_uuid = parent.uuid
                WHERE child.active = 1
            )
            SELECT p.uuid
            FROM partners p
            INNER JOIN subtree ON subtree.uuid = p.uuid
            WHERE p.uuid <> ?1
              AND (?2 IS NULL OR p.type = ?2)
            ORDER BY p.seq ASC;",
        )?;
        let mut rows = stmt.query(params![
            id.to_string(),
            partner_type.map(PartnerType::as_str)
        ])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "partners.uuid").map_err(PartnerRepoError::InvalidData)?);
        }
        Ok(ids)
    }

    fn find_by_email(&self, email: &str, limit: u32) -> PartnerRepoResult<Vec<Partner>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARTNER_SELECT_SQL}
             WHERE email = ?1 COLLATE NOCASE
               AND email <> ''
               AND active = 1
             ORDER BY seq ASC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![email.trim(), i64::from(limit)])?;
        let mut partners = Vec::new();
        while let Some(row) = rows.next()? {
            partners.push(parse_partner_row(row)?);
        }
        Ok(partners)
    }

    fn search_partners(&self, term: &str, limit: u32) -> PartnerRepoResult<Vec<Partner>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PARTNER_SELECT_SQL}
             WHERE active = 1
               AND (
                 name LIKE ?1 ESCAPE '\\'
                 OR email LIKE ?1 ESCAPE '\\'
                 OR ref LIKE ?1 ESCAPE '\\'
               )
             ORDER BY name ASC, seq ASC
             LIMIT ?2;"
        ))?;
        let mut rows = stmt.query(params![like_contains(term.trim()), i64::from(limit)])?;
        let mut partners = Vec::new();
        while let Some(row) = rows.next()? {
            partners.push(parse_partner_row(row)?);
        }
        Ok(partners)
    }

    fn insert_country(&self, country: &Country) -> PartnerRepoResult<()> {
        self.conn.execute(
            "INSERT INTO countries (uuid, code, name, address_format)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                country.id.to_string(),
                country.code.as_str(),
                country.name.as_str(),
                country.address_format.as_deref(),
            ],
        )?;
        Ok(())
    }

    fn get_country(&self, id: Uuid) -> PartnerRepoResult<Option<Country>> {
        let row = self
            .conn
            .query_row(
                "SELECT code, name, address_format FROM countries WHERE uuid = ?1;",
                [id.to_string()],
                |row| {
                    Ok(Country {
                        id,
                        code: row.get(0)?,
                        name: row.get(1)?,
                        address_format: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn insert_state(&self, state: &CountryState) -> PartnerRepoResult<()> {
        self.conn.execute(
            "INSERT INTO country_states (uuid, country_uuid, code, name)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                state.id.to_string(),
                state.country_id.to_string(),
                state.code.as_str(),
                state.name.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_state(&self, id: Uuid) -> PartnerRepoResult<Option<CountryState>> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT country_uuid, code, name FROM country_states WHERE uuid = ?1;",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(country_uuid, code, name)| -> PartnerRepoResult<CountryState> {
            Ok(CountryState {
                id,
                country_id: parse_uuid(&country_uuid, "country_states.country_uuid")
                    .map_err(PartnerRepoError::InvalidData)?,
                code,
                name,
            })
        })
        .transpose()
    }

    fn begin_atomic(&self) -> PartnerRepoResult<()> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {SAVEPOINT_NAME};"))?;
        Ok(())
    }

    fn commit_atomic(&self) -> PartnerRepoResult<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {SAVEPOINT_NAME};"))?;
        Ok(())
    }

    fn rollback_atomic(&self) -> PartnerRepoResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {SAVEPOINT_NAME}; RELEASE SAVEPOINT {SAVEPOINT_NAME};"
        ))?;
        Ok(())
    }
}

fn parse_partner_row(row: &Row<'_>) -> PartnerRepoResult<Partner> {
    let uuid_at = |column: &'static str| -> PartnerRepoResult<Uuid> {
        let text: String = row.get(column)?;
        parse_uuid(&text, column).map_err(PartnerRepoError::InvalidData)
    };
    let optional_uuid = |column: &'static str| -> PartnerRepoResult<Option<Uuid>> {
        row.get::<_, Option<String>>(column)?
            .map(|text| parse_uuid(&text, column).map_err(PartnerRepoError::InvalidData))
            .transpose()
    };
    let flag = |column: &'static str| -> PartnerRepoResult<bool> {
        int_to_bool(row.get(column)?, column).map_err(PartnerRepoError::InvalidData)
    };

    let type_text: String = row.get("type")?;
    let partner_type = PartnerType::parse(&type_text).ok_or_else(|| {
        PartnerRepoError::InvalidData(format!("invalid partner type `{type_text}` in partners.type"))
    })?;

    Ok(Partner {
        id: uuid_at("uuid")?,
        name: row.get("name")?,
        reference: row.get("ref")?,
        parent_id: optional_uuid("parent_uuid")?,
        is_company: flag("is_company")?,
        partner_type,
        company_name: row.get("company_name")?,
        commercial_partner_id: uuid_at("commercial_partner_uuid")?,
        commercial_company_name: row.get("commercial_company_name")?,
        street: row.get("street")?,
        street2: row.get("street2")?,
        zip: row.get("zip")?,
        city: row.get("city")?,
        state_id: optional_uuid("state_uuid")?,
        country_id: optional_uuid("country_uuid")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        mobile: row.get("mobile")?,
        website: row.get("website")?,
        function: row.get("function")?,
        comment: row.get("comment")?,
        lang: row.get("lang")?,
        vat: row.get("vat")?,
        credit_limit: row.get("credit_limit")?,
        customer: flag("customer")?,
        supplier: flag("supplier")?,
        employee: flag("employee")?,
        active: flag("active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_partner_connection_ready(conn: &Connection) -> PartnerRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(PartnerRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["partners", "countries", "country_states"] {
        if !table_exists(conn, table)? {
            return Err(PartnerRepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
