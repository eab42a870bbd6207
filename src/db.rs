use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::{Administrator, Catalog, CatalogEntry, Event, Participant, Registration};
use crate::storage::Storage;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Builder, Connection, Database, Row};
use std::env;
use tracing::info;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_DATABASE_PATH: &str = "event_checkin.db";

fn db_err(context: &str, e: impl std::fmt::Display) -> AppError {
    let message = format!("{context}: {e}");
    if message.contains("UNIQUE constraint failed") {
        return AppError::Conflict(
            "A record with the same unique value already exists.".to_string(),
        );
    }
    AppError::Database { message }
}

fn table_name(catalog: Catalog) -> &'static str {
    match catalog {
        Catalog::Occupation => "occupations",
        Catalog::SpecificNeed => "specific_needs",
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| db_err("Failed to parse date", e))
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| db_err("Failed to parse timestamp", e))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| db_err("Failed to parse uuid", e))
}

pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Open the configured database: remote Turso when LIBSQL_URL is set,
    /// a local file otherwise
    pub async fn connect(settings: &Settings) -> Result<Self> {
        if let Ok(url) = env::var("LIBSQL_URL") {
            let auth_token = env::var("LIBSQL_AUTH_TOKEN").map_err(|_| AppError::Database {
                message: "LIBSQL_AUTH_TOKEN environment variable not set".to_string(),
            })?;

            info!("Connecting to remote database at {}", url);
            let db = Builder::new_remote(url, auth_token)
                .build()
                .await
                .map_err(|e| db_err("Failed to connect to database", e))?;
            return Ok(Self { db });
        }

        let path = settings
            .database_path
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
        info!("Opening local database at {}", path);

        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| db_err("Failed to open database", e))?;
        Ok(Self { db })
    }

    /// Get a connection to the database
    pub fn get_connection(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| db_err("Failed to get database connection", e))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection()?;
        let migration_sql = include_str!("../migrations/001_create_tables.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| db_err("Failed to run migrations", e))?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

/// libSQL-backed storage implementation
pub struct LibsqlStorage {
    manager: DatabaseManager,
}

impl LibsqlStorage {
    pub fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }

    fn entry_from_row(row: &Row) -> Result<CatalogEntry> {
        let id: i64 = row.get(0).map_err(|e| db_err("Failed to get id", e))?;
        let name: String = row.get(1).map_err(|e| db_err("Failed to get name", e))?;
        let is_custom: i64 = row
            .get(2)
            .map_err(|e| db_err("Failed to get is_custom", e))?;
        Ok(CatalogEntry {
            id: Some(id),
            name,
            is_custom: is_custom != 0,
        })
    }

    async fn need_ids_for(&self, conn: &Connection, participant_id: i64) -> Result<Vec<i64>> {
        let mut rows = conn
            .query(
                "SELECT need_id FROM participant_needs WHERE participant_id = ? ORDER BY need_id",
                libsql::params![participant_id],
            )
            .await
            .map_err(|e| db_err("Failed to query participant needs", e))?;

        let mut need_ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            let need_id: i64 = row.get(0).map_err(|e| db_err("Failed to get need_id", e))?;
            need_ids.push(need_id);
        }
        Ok(need_ids)
    }

    async fn participant_from_row(&self, conn: &Connection, row: &Row) -> Result<Participant> {
        let id: i64 = row.get(0).map_err(|e| db_err("Failed to get id", e))?;
        let public_id: String = row
            .get(1)
            .map_err(|e| db_err("Failed to get public_id", e))?;
        let first_name: String = row
            .get(2)
            .map_err(|e| db_err("Failed to get first_name", e))?;
        let last_name: String = row
            .get(3)
            .map_err(|e| db_err("Failed to get last_name", e))?;
        let cpf: String = row.get(4).map_err(|e| db_err("Failed to get cpf", e))?;
        let email: String = row.get(5).map_err(|e| db_err("Failed to get email", e))?;
        let password_hash: String = row
            .get(6)
            .map_err(|e| db_err("Failed to get password_hash", e))?;
        let birth_date: String = row
            .get(7)
            .map_err(|e| db_err("Failed to get birth_date", e))?;
        let occupation_id: i64 = row
            .get(8)
            .map_err(|e| db_err("Failed to get occupation_id", e))?;
        let created_at: String = row
            .get(9)
            .map_err(|e| db_err("Failed to get created_at", e))?;

        Ok(Participant {
            id: Some(id),
            public_id: parse_uuid(&public_id)?,
            first_name,
            last_name,
            cpf,
            email,
            password_hash,
            birth_date: parse_date(&birth_date)?,
            occupation_id,
            need_ids: self.need_ids_for(conn, id).await?,
            created_at: parse_datetime(&created_at)?,
        })
    }

    async fn find_participant(
        &self,
        where_clause: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Participant>> {
        let conn = self.manager.get_connection()?;
        let sql = format!(
            "SELECT id, public_id, first_name, last_name, cpf, email, password_hash, birth_date, occupation_id, created_at FROM participants WHERE {where_clause} = ?"
        );
        let mut rows = conn
            .query(&sql, params)
            .await
            .map_err(|e| db_err("Failed to query participant", e))?;

        match rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            Some(row) => Ok(Some(self.participant_from_row(&conn, &row).await?)),
            None => Ok(None),
        }
    }

    fn administrator_from_row(row: &Row) -> Result<Administrator> {
        let id: String = row.get(0).map_err(|e| db_err("Failed to get id", e))?;
        let name: String = row.get(1).map_err(|e| db_err("Failed to get name", e))?;
        let email: String = row.get(2).map_err(|e| db_err("Failed to get email", e))?;
        let password_hash: String = row
            .get(3)
            .map_err(|e| db_err("Failed to get password_hash", e))?;
        let created_at: String = row
            .get(4)
            .map_err(|e| db_err("Failed to get created_at", e))?;

        Ok(Administrator {
            id: parse_uuid(&id)?,
            name,
            email,
            password_hash,
            created_at: parse_datetime(&created_at)?,
        })
    }

    fn event_from_row(row: &Row) -> Result<Event> {
        let id: i64 = row.get(0).map_err(|e| db_err("Failed to get id", e))?;
        let public_id: String = row
            .get(1)
            .map_err(|e| db_err("Failed to get public_id", e))?;
        let name: String = row.get(2).map_err(|e| db_err("Failed to get name", e))?;
        let category: String = row
            .get(3)
            .map_err(|e| db_err("Failed to get category", e))?;
        let subcategory: String = row
            .get(4)
            .map_err(|e| db_err("Failed to get subcategory", e))?;
        let description: String = row
            .get(5)
            .map_err(|e| db_err("Failed to get description", e))?;
        let starts_on: String = row
            .get(6)
            .map_err(|e| db_err("Failed to get starts_on", e))?;
        let ends_on: String = row.get(7).map_err(|e| db_err("Failed to get ends_on", e))?;
        let registration_open: i64 = row
            .get(8)
            .map_err(|e| db_err("Failed to get registration_open", e))?;

        Ok(Event {
            id: Some(id),
            public_id: parse_uuid(&public_id)?,
            name,
            category,
            subcategory,
            description,
            starts_on: parse_date(&starts_on)?,
            ends_on: parse_date(&ends_on)?,
            registration_open: registration_open != 0,
        })
    }
}

#[async_trait]
impl Storage for LibsqlStorage {
    async fn find_catalog_entry(
        &self,
        catalog: Catalog,
        name: &str,
        is_custom: bool,
    ) -> Result<Option<CatalogEntry>> {
        let conn = self.manager.get_connection()?;
        let sql = format!(
            "SELECT id, name, is_custom FROM {} WHERE name = ? AND is_custom = ?",
            table_name(catalog)
        );
        let mut rows = conn
            .query(&sql, libsql::params![name, is_custom as i64])
            .await
            .map_err(|e| db_err("Failed to query catalog entry", e))?;

        match rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            Some(row) => Ok(Some(Self::entry_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_catalog_entry_by_id(
        &self,
        catalog: Catalog,
        id: i64,
    ) -> Result<Option<CatalogEntry>> {
        let conn = self.manager.get_connection()?;
        let sql = format!(
            "SELECT id, name, is_custom FROM {} WHERE id = ?",
            table_name(catalog)
        );
        let mut rows = conn
            .query(&sql, libsql::params![id])
            .await
            .map_err(|e| db_err("Failed to query catalog entry", e))?;

        match rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            Some(row) => Ok(Some(Self::entry_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_catalog_entry(
        &self,
        catalog: Catalog,
        entry: &mut CatalogEntry,
    ) -> Result<()> {
        let conn = self.manager.get_connection()?;
        let sql = format!(
            "INSERT INTO {} (name, is_custom) VALUES (?, ?)",
            table_name(catalog)
        );
        conn.execute(&sql, libsql::params![entry.name.clone(), entry.is_custom as i64])
            .await
            .map_err(|e| db_err("Failed to insert catalog entry", e))?;

        entry.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    async fn list_catalog_entries(
        &self,
        catalog: Catalog,
        canonical_only: bool,
    ) -> Result<Vec<CatalogEntry>> {
        let conn = self.manager.get_connection()?;
        let sql = if canonical_only {
            format!(
                "SELECT id, name, is_custom FROM {} WHERE is_custom = 0 ORDER BY id",
                table_name(catalog)
            )
        } else {
            format!(
                "SELECT id, name, is_custom FROM {} ORDER BY id",
                table_name(catalog)
            )
        };
        let mut rows = conn
            .query(&sql, libsql::params![])
            .await
            .map_err(|e| db_err("Failed to query catalog entries", e))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            entries.push(Self::entry_from_row(&row)?);
        }
        Ok(entries)
    }

    async fn update_catalog_entry(&self, catalog: Catalog, entry: &CatalogEntry) -> Result<()> {
        let entry_id = entry.id.ok_or_else(|| AppError::Database {
            message: "Cannot update catalog entry without ID".to_string(),
        })?;

        let conn = self.manager.get_connection()?;
        let sql = format!("UPDATE {} SET name = ? WHERE id = ?", table_name(catalog));
        let affected = conn
            .execute(&sql, libsql::params![entry.name.clone(), entry_id])
            .await
            .map_err(|e| db_err("Failed to update catalog entry", e))?;

        if affected == 0 {
            return Err(AppError::NotFound("Catalog entry not found.".to_string()));
        }
        Ok(())
    }

    async fn delete_catalog_entry(&self, catalog: Catalog, id: i64) -> Result<()> {
        let conn = self.manager.get_connection()?;
        let sql = format!("DELETE FROM {} WHERE id = ?", table_name(catalog));
        let affected = conn
            .execute(&sql, libsql::params![id])
            .await
            .map_err(|e| db_err("Failed to delete catalog entry", e))?;

        if affected == 0 {
            return Err(AppError::NotFound("Catalog entry not found.".to_string()));
        }
        Ok(())
    }

    async fn create_participant(&self, participant: &mut Participant) -> Result<()> {
        let conn = self.manager.get_connection()?;
        conn.execute(
            "INSERT INTO participants (public_id, first_name, last_name, cpf, email, password_hash, birth_date, occupation_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                participant.public_id.to_string(),
                participant.first_name.clone(),
                participant.last_name.clone(),
                participant.cpf.clone(),
                participant.email.clone(),
                participant.password_hash.clone(),
                participant.birth_date.format(DATE_FORMAT).to_string(),
                participant.occupation_id,
                participant.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| db_err("Failed to insert participant", e))?;

        let participant_id = conn.last_insert_rowid();
        participant.id = Some(participant_id);

        for need_id in &participant.need_ids {
            conn.execute(
                "INSERT OR IGNORE INTO participant_needs (participant_id, need_id) VALUES (?, ?)",
                libsql::params![participant_id, *need_id],
            )
            .await
            .map_err(|e| db_err("Failed to insert participant need", e))?;
        }
        Ok(())
    }

    async fn get_participant_by_id(&self, id: i64) -> Result<Option<Participant>> {
        self.find_participant("id", libsql::params![id]).await
    }

    async fn get_participant_by_public_id(&self, public_id: Uuid) -> Result<Option<Participant>> {
        self.find_participant("public_id", libsql::params![public_id.to_string()])
            .await
    }

    async fn get_participant_by_email(&self, email: &str) -> Result<Option<Participant>> {
        self.find_participant("email", libsql::params![email.to_string()])
            .await
    }

    async fn get_participant_by_cpf(&self, cpf: &str) -> Result<Option<Participant>> {
        self.find_participant("cpf", libsql::params![cpf.to_string()])
            .await
    }

    async fn list_participants(&self) -> Result<Vec<Participant>> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, public_id, first_name, last_name, cpf, email, password_hash, birth_date, occupation_id, created_at FROM participants ORDER BY created_at DESC",
                libsql::params![],
            )
            .await
            .map_err(|e| db_err("Failed to query participants", e))?;

        let mut participants = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            participants.push(self.participant_from_row(&conn, &row).await?);
        }
        Ok(participants)
    }

    async fn update_participant(&self, participant: &Participant) -> Result<()> {
        let participant_id = participant.id.ok_or_else(|| AppError::Database {
            message: "Cannot update participant without ID".to_string(),
        })?;

        let conn = self.manager.get_connection()?;
        conn.execute(
            "UPDATE participants SET first_name = ?, last_name = ?, cpf = ?, email = ?, birth_date = ?, occupation_id = ? WHERE id = ?",
            libsql::params![
                participant.first_name.clone(),
                participant.last_name.clone(),
                participant.cpf.clone(),
                participant.email.clone(),
                participant.birth_date.format(DATE_FORMAT).to_string(),
                participant.occupation_id,
                participant_id,
            ],
        )
        .await
        .map_err(|e| db_err("Failed to update participant", e))?;

        conn.execute(
            "DELETE FROM participant_needs WHERE participant_id = ?",
            libsql::params![participant_id],
        )
        .await
        .map_err(|e| db_err("Failed to clear participant needs", e))?;

        for need_id in &participant.need_ids {
            conn.execute(
                "INSERT OR IGNORE INTO participant_needs (participant_id, need_id) VALUES (?, ?)",
                libsql::params![participant_id, *need_id],
            )
            .await
            .map_err(|e| db_err("Failed to insert participant need", e))?;
        }
        Ok(())
    }

    async fn delete_participant(&self, id: i64) -> Result<()> {
        let conn = self.manager.get_connection()?;

        conn.execute(
            "DELETE FROM participant_needs WHERE participant_id = ?",
            libsql::params![id],
        )
        .await
        .map_err(|e| db_err("Failed to delete participant needs", e))?;

        conn.execute(
            "DELETE FROM registrations WHERE participant_id = ?",
            libsql::params![id],
        )
        .await
        .map_err(|e| db_err("Failed to delete registrations", e))?;

        let affected = conn
            .execute("DELETE FROM participants WHERE id = ?", libsql::params![id])
            .await
            .map_err(|e| db_err("Failed to delete participant", e))?;

        if affected == 0 {
            return Err(AppError::NotFound("Participant not found.".to_string()));
        }
        Ok(())
    }

    async fn create_administrator(&self, administrator: &Administrator) -> Result<()> {
        let conn = self.manager.get_connection()?;
        conn.execute(
            "INSERT INTO administrators (id, name, email, password_hash, created_at) VALUES (?, ?, ?, ?, ?)",
            libsql::params![
                administrator.id.to_string(),
                administrator.name.clone(),
                administrator.email.clone(),
                administrator.password_hash.clone(),
                administrator.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| db_err("Failed to insert administrator", e))?;
        Ok(())
    }

    async fn get_administrator_by_id(&self, id: Uuid) -> Result<Option<Administrator>> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, password_hash, created_at FROM administrators WHERE id = ?",
                libsql::params![id.to_string()],
            )
            .await
            .map_err(|e| db_err("Failed to query administrator", e))?;

        match rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            Some(row) => Ok(Some(Self::administrator_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_administrator_by_email(&self, email: &str) -> Result<Option<Administrator>> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, password_hash, created_at FROM administrators WHERE email = ?",
                libsql::params![email],
            )
            .await
            .map_err(|e| db_err("Failed to query administrator", e))?;

        match rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            Some(row) => Ok(Some(Self::administrator_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_administrators(&self) -> Result<Vec<Administrator>> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, password_hash, created_at FROM administrators ORDER BY created_at",
                libsql::params![],
            )
            .await
            .map_err(|e| db_err("Failed to query administrators", e))?;

        let mut administrators = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            administrators.push(Self::administrator_from_row(&row)?);
        }
        Ok(administrators)
    }

    async fn create_event(&self, event: &mut Event) -> Result<()> {
        let conn = self.manager.get_connection()?;
        conn.execute(
            "INSERT INTO events (public_id, name, category, subcategory, description, starts_on, ends_on, registration_open) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            libsql::params![
                event.public_id.to_string(),
                event.name.clone(),
                event.category.clone(),
                event.subcategory.clone(),
                event.description.clone(),
                event.starts_on.format(DATE_FORMAT).to_string(),
                event.ends_on.format(DATE_FORMAT).to_string(),
                event.registration_open as i64,
            ],
        )
        .await
        .map_err(|e| db_err("Failed to insert event", e))?;

        event.id = Some(conn.last_insert_rowid());
        Ok(())
    }

    async fn get_event_by_public_id(&self, public_id: Uuid) -> Result<Option<Event>> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, public_id, name, category, subcategory, description, starts_on, ends_on, registration_open FROM events WHERE public_id = ?",
                libsql::params![public_id.to_string()],
            )
            .await
            .map_err(|e| db_err("Failed to query event", e))?;

        match rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            Some(row) => Ok(Some(Self::event_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_open_events(&self, today: NaiveDate) -> Result<Vec<Event>> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT id, public_id, name, category, subcategory, description, starts_on, ends_on, registration_open FROM events WHERE registration_open = 1 AND ends_on >= ? ORDER BY starts_on",
                libsql::params![today.format(DATE_FORMAT).to_string()],
            )
            .await
            .map_err(|e| db_err("Failed to query events", e))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            events.push(Self::event_from_row(&row)?);
        }
        Ok(events)
    }

    async fn list_events_for_participant(
        &self,
        participant_id: i64,
        ending_on_or_after: Option<NaiveDate>,
    ) -> Result<Vec<Event>> {
        let conn = self.manager.get_connection()?;
        let mut rows = match ending_on_or_after {
            Some(date) => conn
                .query(
                    "SELECT e.id, e.public_id, e.name, e.category, e.subcategory, e.description, e.starts_on, e.ends_on, e.registration_open FROM events e JOIN registrations r ON r.event_id = e.id WHERE r.participant_id = ? AND e.ends_on >= ? ORDER BY e.starts_on",
                    libsql::params![participant_id, date.format(DATE_FORMAT).to_string()],
                )
                .await,
            None => conn
                .query(
                    "SELECT e.id, e.public_id, e.name, e.category, e.subcategory, e.description, e.starts_on, e.ends_on, e.registration_open FROM events e JOIN registrations r ON r.event_id = e.id WHERE r.participant_id = ? ORDER BY e.starts_on DESC",
                    libsql::params![participant_id],
                )
                .await,
        }
        .map_err(|e| db_err("Failed to query events", e))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
        {
            events.push(Self::event_from_row(&row)?);
        }
        Ok(events)
    }

    async fn create_registration(&self, registration: &Registration) -> Result<()> {
        let conn = self.manager.get_connection()?;
        conn.execute(
            "INSERT INTO registrations (participant_id, event_id, registered_at) VALUES (?, ?, ?)",
            libsql::params![
                registration.participant_id,
                registration.event_id,
                registration.registered_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| db_err("Failed to insert registration", e))
        .map_err(|e| match e {
            AppError::Conflict(_) => AppError::Conflict(
                "Participant is already registered for this event.".to_string(),
            ),
            other => other,
        })?;
        Ok(())
    }

    async fn registration_exists(&self, participant_id: i64, event_id: i64) -> Result<bool> {
        let conn = self.manager.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM registrations WHERE participant_id = ? AND event_id = ?",
                libsql::params![participant_id, event_id],
            )
            .await
            .map_err(|e| db_err("Failed to query registration", e))?;

        Ok(rows
            .next()
            .await
            .map_err(|e| db_err("Failed to read row", e))?
            .is_some())
    }
}
