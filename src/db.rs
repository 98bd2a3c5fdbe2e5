use crate::error::{LedgerError, LedgerResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of month slots in one annual cycle
pub const MONTHS_PER_CYCLE: u8 = 12;

/// Enrolled person with a recurring monthly charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub group_name: String,
    pub display_name: String,
    pub guardian_name: Option<String>,
    pub contact: Option<String>,
    pub base_monthly_charge: i64,
}

/// Input for registering a person
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPerson {
    pub group_name: String,
    pub display_name: String,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub base_monthly_charge: i64,
}

impl NewPerson {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.group_name.trim().is_empty() || self.display_name.trim().is_empty() {
            return Err(LedgerError::validation(
                "group_name and display_name are required",
            ));
        }
        validate_charge(self.base_monthly_charge)
    }
}

/// Partial update; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonUpdate {
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub base_monthly_charge: Option<i64>,
}

impl PersonUpdate {
    pub fn validate(&self) -> LedgerResult<()> {
        if let Some(name) = &self.group_name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("group_name is required"));
            }
        }
        if let Some(name) = &self.display_name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("display_name is required"));
            }
        }
        if let Some(charge) = self.base_monthly_charge {
            validate_charge(charge)?;
        }
        Ok(())
    }

    fn apply_to(&self, person: &mut Person) {
        if let Some(name) = &self.group_name {
            person.group_name = name.trim().to_string();
        }
        if let Some(name) = &self.display_name {
            person.display_name = name.trim().to_string();
        }
        if let Some(guardian) = &self.guardian_name {
            person.guardian_name = non_blank(Some(guardian));
        }
        if let Some(contact) = &self.contact {
            person.contact = non_blank(Some(contact));
        }
        if let Some(charge) = self.base_monthly_charge {
            person.base_monthly_charge = charge;
        }
    }
}

/// Amount recorded for one (person, month slot)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub id: i64,
    pub person_id: i64,
    pub month_index: u8,
    pub amount: i64,
    pub recorded_at: DateTime<Utc>,
}

fn validate_charge(charge: i64) -> LedgerResult<()> {
    if charge < 0 {
        return Err(LedgerError::validation("base_monthly_charge must be >= 0"));
    }
    Ok(())
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// STORE (one SQLite file, one connection per operation)
// ============================================================================

/// Handle on the store file.
///
/// No connection is held between operations: the sync server may swap the
/// whole file at any time, and the next `connect()` simply sees the new one.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the store at `path` and bootstrap its schema
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Store { path: path.into() };
        if let Some(parent) = store.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory {:?}", parent)
                })?;
            }
        }
        let conn = Connection::open(&store.path)
            .with_context(|| format!("Failed to open store {:?}", store.path))?;
        setup_database(&conn)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection for a single unit of work
    pub fn connect(&self) -> LedgerResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // Rollback journal, not WAL: the main file must be a complete snapshot
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "DELETE", |row| row.get(0))?;
        Ok(conn)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_name TEXT NOT NULL,
            display_name TEXT NOT NULL,
            guardian_name TEXT,
            contact TEXT,
            base_monthly_charge INTEGER NOT NULL DEFAULT 0
                CHECK (base_monthly_charge >= 0)
        );

        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
            month_index INTEGER NOT NULL CHECK (month_index BETWEEN 0 AND 11),
            amount INTEGER NOT NULL DEFAULT 0 CHECK (amount >= 0),
            recorded_at TEXT NOT NULL,
            UNIQUE (person_id, month_index)
        );

        CREATE INDEX IF NOT EXISTS idx_persons_group ON persons(group_name);
        CREATE INDEX IF NOT EXISTS idx_payments_person ON payments(person_id);",
    )
    .context("Failed to bootstrap store schema")?;

    Ok(())
}

// ============================================================================
// PERSONS
// ============================================================================

const PERSON_COLUMNS: &str =
    "id, group_name, display_name, guardian_name, contact, base_monthly_charge";

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        group_name: row.get(1)?,
        display_name: row.get(2)?,
        guardian_name: row.get(3)?,
        contact: row.get(4)?,
        base_monthly_charge: row.get(5)?,
    })
}

pub fn insert_person(conn: &Connection, person: &NewPerson) -> LedgerResult<i64> {
    person.validate()?;

    conn.execute(
        "INSERT INTO persons (group_name, display_name, guardian_name, contact, base_monthly_charge)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            person.group_name.trim(),
            person.display_name.trim(),
            non_blank(person.guardian_name.as_ref()),
            non_blank(person.contact.as_ref()),
            person.base_monthly_charge,
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::debug!(person_id = id, group = %person.group_name, "person registered");
    Ok(id)
}

pub fn find_person(conn: &Connection, person_id: i64) -> LedgerResult<Option<Person>> {
    let sql = format!("SELECT {} FROM persons WHERE id = ?1", PERSON_COLUMNS);
    let person = conn
        .query_row(&sql, [person_id], person_from_row)
        .optional()?;
    Ok(person)
}

pub fn get_person(conn: &Connection, person_id: i64) -> LedgerResult<Person> {
    find_person(conn, person_id)?.ok_or_else(|| LedgerError::person_not_found(person_id))
}

pub fn list_persons(conn: &Connection, group: Option<&str>) -> LedgerResult<Vec<Person>> {
    let persons = match group {
        Some(group) => {
            let sql = format!(
                "SELECT {} FROM persons WHERE group_name = ?1 ORDER BY display_name, id",
                PERSON_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([group], person_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!(
                "SELECT {} FROM persons ORDER BY group_name, display_name, id",
                PERSON_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], person_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(persons)
}

pub fn update_person(
    conn: &Connection,
    person_id: i64,
    update: &PersonUpdate,
) -> LedgerResult<Person> {
    update.validate()?;

    let tx = conn.unchecked_transaction()?;
    let mut person = get_person(&tx, person_id)?;
    update.apply_to(&mut person);

    tx.execute(
        "UPDATE persons
         SET group_name = ?1, display_name = ?2, guardian_name = ?3,
             contact = ?4, base_monthly_charge = ?5
         WHERE id = ?6",
        params![
            person.group_name,
            person.display_name,
            person.guardian_name,
            person.contact,
            person.base_monthly_charge,
            person.id,
        ],
    )?;
    tx.commit()?;

    Ok(person)
}

/// Delete a person together with every payment it owns
pub fn delete_person(conn: &Connection, person_id: i64) -> LedgerResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute("DELETE FROM payments WHERE person_id = ?1", [person_id])?;
    let deleted = tx.execute("DELETE FROM persons WHERE id = ?1", [person_id])?;
    if deleted == 0 {
        return Err(LedgerError::person_not_found(person_id));
    }

    tx.commit()?;
    Ok(())
}

// ============================================================================
// GROUPS
// ============================================================================

pub fn list_groups(conn: &Connection) -> LedgerResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT group_name FROM persons ORDER BY group_name")?;
    let groups = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(groups)
}

/// Delete every person in `group_name` (and their payments); returns how many persons went
pub fn delete_group(conn: &Connection, group_name: &str) -> LedgerResult<usize> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "DELETE FROM payments
         WHERE person_id IN (SELECT id FROM persons WHERE group_name = ?1)",
        [group_name],
    )?;
    let deleted = tx.execute("DELETE FROM persons WHERE group_name = ?1", [group_name])?;

    tx.commit()?;
    tracing::info!(group = group_name, deleted, "group deleted");
    Ok(deleted)
}

// ============================================================================
// PAYMENTS
// ============================================================================

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentEvent> {
    let recorded_at: String = row.get(4)?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
        .with_timezone(&Utc);

    Ok(PaymentEvent {
        id: row.get(0)?,
        person_id: row.get(1)?,
        month_index: row.get(2)?,
        amount: row.get(3)?,
        recorded_at,
    })
}

pub fn get_payments_for_person(
    conn: &Connection,
    person_id: i64,
) -> LedgerResult<Vec<PaymentEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, person_id, month_index, amount, recorded_at
         FROM payments
         WHERE person_id = ?1
         ORDER BY month_index",
    )?;

    let payments = stmt
        .query_map([person_id], payment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(payments)
}

pub fn find_payment(
    conn: &Connection,
    person_id: i64,
    month_index: u8,
) -> LedgerResult<Option<PaymentEvent>> {
    let payment = conn
        .query_row(
            "SELECT id, person_id, month_index, amount, recorded_at
             FROM payments
             WHERE person_id = ?1 AND month_index = ?2",
            params![person_id, month_index],
            payment_from_row,
        )
        .optional()?;
    Ok(payment)
}

/// Insert or overwrite the payment row for one slot; returns its id.
/// Callers validate inputs and own the surrounding transaction.
pub(crate) fn upsert_payment_row(
    conn: &Connection,
    person_id: i64,
    month_index: u8,
    amount: i64,
    recorded_at: DateTime<Utc>,
) -> LedgerResult<i64> {
    let id = conn.query_row(
        "INSERT INTO payments (person_id, month_index, amount, recorded_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (person_id, month_index)
         DO UPDATE SET amount = excluded.amount, recorded_at = excluded.recorded_at
         RETURNING id",
        params![person_id, month_index, amount, recorded_at.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn count_payments(conn: &Connection, person_id: i64) -> LedgerResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE person_id = ?1",
        [person_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
