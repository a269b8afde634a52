//! SQLite-backed [`ContactStore`] implementation.
//!
//! A [`SqliteStore`] is created per request by [`SqliteProvider`]. It checks
//! a connection out of the pool on first use and hands it back when the
//! store is dropped, whichever way the request ends. Nothing shares that
//! connection with another request.
//!
//! Filters are assembled with [`QueryBuilder`]: each [`Predicate`] pushes its
//! own SQL fragment and binds its own value. Search text and gender codes
//! never appear in the SQL text itself.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tokio::sync::{Mutex, MutexGuard, OnceCell};

use contact_directory_core::models::{Contact, ContactFields};
use contact_directory_core::query::{ContactQuery, Predicate};
use contact_directory_core::store::{ContactStore, ListWindow, StoreProvider};

const SELECT_CONTACT: &str = "SELECT id, first_name, last_name, email_address, gender FROM contacts";

/// Opens a fresh [`SqliteStore`] for each unit of work.
#[derive(Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
}

impl SqliteProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl StoreProvider for SqliteProvider {
    fn open(&self) -> Box<dyn ContactStore> {
        Box::new(SqliteStore::new(self.pool.clone()))
    }
}

/// Request-scoped SQLite store.
///
/// Holds at most one pooled connection, acquired lazily.
pub struct SqliteStore {
    pool: SqlitePool,
    conn: OnceCell<Mutex<PoolConnection<Sqlite>>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            conn: OnceCell::new(),
        }
    }

    /// Whether this store has checked out a connection yet.
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    async fn connection(&self) -> Result<MutexGuard<'_, PoolConnection<Sqlite>>> {
        let cell = self
            .conn
            .get_or_try_init(|| async {
                tracing::trace!("acquiring pooled connection");
                self.pool.acquire().await.map(Mutex::new)
            })
            .await?;
        Ok(cell.lock().await)
    }
}

fn row_to_contact(row: &SqliteRow) -> Contact {
    Contact {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email_address: row.get("email_address"),
        gender: row.get("gender"),
    }
}

/// Appends `WHERE p1 AND p2 ...` for the given predicates, binding each value.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Search(text) => {
                qb.push("(");
                for (j, column) in ["first_name", "last_name", "email_address"]
                    .iter()
                    .enumerate()
                {
                    if j > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(format!("instr(lower({}), lower(", column));
                    qb.push_bind(text.clone());
                    qb.push(")) > 0");
                }
                qb.push(")");
            }
            Predicate::Gender(gender) => {
                qb.push("upper(gender) = upper(");
                qb.push_bind(gender.code());
                qb.push(")");
            }
        }
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn get(&self, id: i64) -> Result<Option<Contact>> {
        let mut conn = self.connection().await?;
        let mut select = QueryBuilder::<Sqlite>::new(SELECT_CONTACT);
        select.push(" WHERE id = ");
        select.push_bind(id);
        let row = select.build().fetch_optional(&mut **conn).await?;
        Ok(row.as_ref().map(row_to_contact))
    }

    async fn list(&self, query: &ContactQuery) -> Result<ListWindow> {
        let predicates = query.predicates();
        let window = query.window();
        let mut conn = self.connection().await?;

        let mut select = QueryBuilder::<Sqlite>::new(SELECT_CONTACT);
        push_filter(&mut select, &predicates);
        select.push(" ORDER BY first_name, last_name, id LIMIT ");
        select.push_bind(i64::from(window.limit));
        select.push(" OFFSET ");
        select.push_bind(window.offset as i64);

        let rows = select.build().fetch_all(&mut **conn).await?;
        let contacts: Vec<Contact> = rows.iter().map(row_to_contact).collect();

        // Separate count over the unwindowed set; not derived from `rows`.
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(id) FROM contacts");
        push_filter(&mut count, &predicates);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&mut **conn)
            .await?;

        tracing::debug!(
            page = query.page,
            filters = predicates.len(),
            fetched = contacts.len(),
            total,
            "listed contacts"
        );

        Ok(ListWindow {
            contacts,
            has_next_page: query.next_page(total.max(0) as u64).is_some(),
        })
    }

    async fn create(&self, fields: &ContactFields) -> Result<Contact> {
        let mut conn = self.connection().await?;
        let result = sqlx::query(
            "INSERT INTO contacts (first_name, last_name, email_address, gender) VALUES (?, ?, ?, ?)",
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email_address)
        .bind(fields.gender.code())
        .execute(&mut **conn)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(id, "created contact");
        Ok(Contact::from_fields(id, fields))
    }

    async fn update(&self, id: i64, fields: &ContactFields) -> Result<Option<Contact>> {
        let mut conn = self.connection().await?;
        let result = sqlx::query(
            r#"
            UPDATE contacts
            SET first_name = ?, last_name = ?, email_address = ?, gender = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.first_name)
        .bind(&fields.last_name)
        .bind(&fields.email_address)
        .bind(fields.gender.code())
        .bind(id)
        .execute(&mut **conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        tracing::debug!(id, "updated contact");
        Ok(Some(Contact::from_fields(id, fields)))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut conn = self.connection().await?;
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&mut **conn)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::debug!(id, "deleted contact");
        }
        Ok(deleted)
    }
}
