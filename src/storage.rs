use crate::error::{AppError, Result};
use crate::models::{Administrator, Catalog, CatalogEntry, Event, Participant, Registration};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Storage trait for persisting catalog, participant, administrator, event
/// and registration data
#[async_trait]
pub trait Storage: Send + Sync {
    // Catalog operations
    async fn find_catalog_entry(
        &self,
        catalog: Catalog,
        name: &str,
        is_custom: bool,
    ) -> Result<Option<CatalogEntry>>;
    async fn find_catalog_entry_by_id(
        &self,
        catalog: Catalog,
        id: i64,
    ) -> Result<Option<CatalogEntry>>;
    /// Inserts an entry, assigning its id. Fails with `Conflict` when the
    /// name is already taken in the catalog.
    async fn insert_catalog_entry(&self, catalog: Catalog, entry: &mut CatalogEntry)
        -> Result<()>;
    async fn list_catalog_entries(
        &self,
        catalog: Catalog,
        canonical_only: bool,
    ) -> Result<Vec<CatalogEntry>>;
    async fn update_catalog_entry(&self, catalog: Catalog, entry: &CatalogEntry) -> Result<()>;
    async fn delete_catalog_entry(&self, catalog: Catalog, id: i64) -> Result<()>;

    // Participant operations
    async fn create_participant(&self, participant: &mut Participant) -> Result<()>;
    async fn get_participant_by_id(&self, id: i64) -> Result<Option<Participant>>;
    async fn get_participant_by_public_id(&self, public_id: Uuid) -> Result<Option<Participant>>;
    async fn get_participant_by_email(&self, email: &str) -> Result<Option<Participant>>;
    async fn get_participant_by_cpf(&self, cpf: &str) -> Result<Option<Participant>>;
    /// Participants ordered newest-first
    async fn list_participants(&self) -> Result<Vec<Participant>>;
    async fn update_participant(&self, participant: &Participant) -> Result<()>;
    async fn delete_participant(&self, id: i64) -> Result<()>;

    // Administrator operations
    async fn create_administrator(&self, administrator: &Administrator) -> Result<()>;
    async fn get_administrator_by_id(&self, id: Uuid) -> Result<Option<Administrator>>;
    async fn get_administrator_by_email(&self, email: &str) -> Result<Option<Administrator>>;
    async fn list_administrators(&self) -> Result<Vec<Administrator>>;

    // Event operations
    async fn create_event(&self, event: &mut Event) -> Result<()>;
    async fn get_event_by_public_id(&self, public_id: Uuid) -> Result<Option<Event>>;
    /// Events still open for registration whose end date is today or later,
    /// ordered by start date
    async fn list_open_events(&self, today: NaiveDate) -> Result<Vec<Event>>;
    /// Events a participant is registered for. With a date, only events
    /// ending on or after it, ordered by start date; without, every event,
    /// newest start date first.
    async fn list_events_for_participant(
        &self,
        participant_id: i64,
        ending_on_or_after: Option<NaiveDate>,
    ) -> Result<Vec<Event>>;

    // Registration operations
    /// Fails with `Conflict` when the participant is already registered
    async fn create_registration(&self, registration: &Registration) -> Result<()>;
    async fn registration_exists(&self, participant_id: i64, event_id: i64) -> Result<bool>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    occupations: Mutex<HashMap<i64, CatalogEntry>>,
    specific_needs: Mutex<HashMap<i64, CatalogEntry>>,
    participants: Mutex<HashMap<i64, Participant>>,
    administrators: Mutex<HashMap<Uuid, Administrator>>,
    events: Mutex<HashMap<i64, Event>>,
    registrations: Mutex<Vec<Registration>>,
    next_id: AtomicI64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            occupations: Mutex::new(HashMap::new()),
            specific_needs: Mutex::new(HashMap::new()),
            participants: Mutex::new(HashMap::new()),
            administrators: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
            registrations: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn table(&self, catalog: Catalog) -> &Mutex<HashMap<i64, CatalogEntry>> {
        match catalog {
            Catalog::Occupation => &self.occupations,
            Catalog::SpecificNeed => &self.specific_needs,
        }
    }

    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_catalog_entry(
        &self,
        catalog: Catalog,
        name: &str,
        is_custom: bool,
    ) -> Result<Option<CatalogEntry>> {
        let entries = self.table(catalog).lock().unwrap();
        let entry = entries
            .values()
            .find(|e| e.name == name && e.is_custom == is_custom)
            .cloned();
        Ok(entry)
    }

    async fn find_catalog_entry_by_id(
        &self,
        catalog: Catalog,
        id: i64,
    ) -> Result<Option<CatalogEntry>> {
        let entries = self.table(catalog).lock().unwrap();
        Ok(entries.get(&id).cloned())
    }

    async fn insert_catalog_entry(
        &self,
        catalog: Catalog,
        entry: &mut CatalogEntry,
    ) -> Result<()> {
        // Name uniqueness is checked under the same lock as the insert, so
        // concurrent callers cannot both create the same name
        let mut entries = self.table(catalog).lock().unwrap();
        if entries.values().any(|e| e.name == entry.name) {
            return Err(AppError::Conflict(format!(
                "An entry named '{}' already exists.",
                entry.name
            )));
        }

        let id = self.assign_id();
        entry.id = Some(id);
        entries.insert(id, entry.clone());

        debug!("Created {} entry: {} with id {}", catalog.as_str(), entry.name, id);
        Ok(())
    }

    async fn list_catalog_entries(
        &self,
        catalog: Catalog,
        canonical_only: bool,
    ) -> Result<Vec<CatalogEntry>> {
        let entries = self.table(catalog).lock().unwrap();
        let mut listed: Vec<CatalogEntry> = entries
            .values()
            .filter(|e| !canonical_only || !e.is_custom)
            .cloned()
            .collect();
        listed.sort_by_key(|e| e.id);
        Ok(listed)
    }

    async fn update_catalog_entry(&self, catalog: Catalog, entry: &CatalogEntry) -> Result<()> {
        let entry_id = entry.id.ok_or_else(|| AppError::Database {
            message: "Cannot update catalog entry without ID".to_string(),
        })?;

        let mut entries = self.table(catalog).lock().unwrap();
        if !entries.contains_key(&entry_id) {
            return Err(AppError::NotFound("Catalog entry not found.".to_string()));
        }
        if entries
            .values()
            .any(|e| e.name == entry.name && e.id != entry.id)
        {
            return Err(AppError::Conflict(format!(
                "An entry named '{}' already exists.",
                entry.name
            )));
        }
        entries.insert(entry_id, entry.clone());

        debug!("Updated {} entry with id {}", catalog.as_str(), entry_id);
        Ok(())
    }

    async fn delete_catalog_entry(&self, catalog: Catalog, id: i64) -> Result<()> {
        let mut entries = self.table(catalog).lock().unwrap();
        if entries.remove(&id).is_none() {
            return Err(AppError::NotFound("Catalog entry not found.".to_string()));
        }
        Ok(())
    }

    async fn create_participant(&self, participant: &mut Participant) -> Result<()> {
        let id = self.assign_id();
        participant.id = Some(id);

        let mut participants = self.participants.lock().unwrap();
        participants.insert(id, participant.clone());

        debug!("Created participant {} with id {}", participant.public_id, id);
        Ok(())
    }

    async fn get_participant_by_id(&self, id: i64) -> Result<Option<Participant>> {
        let participants = self.participants.lock().unwrap();
        Ok(participants.get(&id).cloned())
    }

    async fn get_participant_by_public_id(&self, public_id: Uuid) -> Result<Option<Participant>> {
        let participants = self.participants.lock().unwrap();
        let participant = participants
            .values()
            .find(|p| p.public_id == public_id)
            .cloned();
        Ok(participant)
    }

    async fn get_participant_by_email(&self, email: &str) -> Result<Option<Participant>> {
        let participants = self.participants.lock().unwrap();
        let participant = participants.values().find(|p| p.email == email).cloned();
        Ok(participant)
    }

    async fn get_participant_by_cpf(&self, cpf: &str) -> Result<Option<Participant>> {
        let participants = self.participants.lock().unwrap();
        let participant = participants.values().find(|p| p.cpf == cpf).cloned();
        Ok(participant)
    }

    async fn list_participants(&self) -> Result<Vec<Participant>> {
        let participants = self.participants.lock().unwrap();
        let mut listed: Vec<Participant> = participants.values().cloned().collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn update_participant(&self, participant: &Participant) -> Result<()> {
        let participant_id = participant.id.ok_or_else(|| AppError::Database {
            message: "Cannot update participant without ID".to_string(),
        })?;

        let mut participants = self.participants.lock().unwrap();
        if participants
            .values()
            .any(|p| p.cpf == participant.cpf && p.id != participant.id)
        {
            return Err(AppError::Conflict("This CPF is already registered.".to_string()));
        }
        if participants
            .values()
            .any(|p| p.email == participant.email && p.id != participant.id)
        {
            return Err(AppError::Conflict(
                "This email is already registered.".to_string(),
            ));
        }
        participants.insert(participant_id, participant.clone());

        debug!("Updated participant with id {}", participant_id);
        Ok(())
    }

    async fn delete_participant(&self, id: i64) -> Result<()> {
        let mut participants = self.participants.lock().unwrap();
        if participants.remove(&id).is_none() {
            return Err(AppError::NotFound("Participant not found.".to_string()));
        }
        drop(participants);

        let mut registrations = self.registrations.lock().unwrap();
        registrations.retain(|r| r.participant_id != id);
        Ok(())
    }

    async fn create_administrator(&self, administrator: &Administrator) -> Result<()> {
        let mut administrators = self.administrators.lock().unwrap();
        if administrators
            .values()
            .any(|a| a.email == administrator.email)
        {
            return Err(AppError::Conflict(
                "This email is already registered.".to_string(),
            ));
        }
        administrators.insert(administrator.id, administrator.clone());

        debug!("Created administrator {} ({})", administrator.name, administrator.id);
        Ok(())
    }

    async fn get_administrator_by_id(&self, id: Uuid) -> Result<Option<Administrator>> {
        let administrators = self.administrators.lock().unwrap();
        Ok(administrators.get(&id).cloned())
    }

    async fn get_administrator_by_email(&self, email: &str) -> Result<Option<Administrator>> {
        let administrators = self.administrators.lock().unwrap();
        let administrator = administrators.values().find(|a| a.email == email).cloned();
        Ok(administrator)
    }

    async fn list_administrators(&self) -> Result<Vec<Administrator>> {
        let administrators = self.administrators.lock().unwrap();
        let mut listed: Vec<Administrator> = administrators.values().cloned().collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(listed)
    }

    async fn create_event(&self, event: &mut Event) -> Result<()> {
        let id = self.assign_id();
        event.id = Some(id);

        let mut events = self.events.lock().unwrap();
        events.insert(id, event.clone());

        debug!("Created event: {} with id {}", event.name, id);
        Ok(())
    }

    async fn get_event_by_public_id(&self, public_id: Uuid) -> Result<Option<Event>> {
        let events = self.events.lock().unwrap();
        let event = events.values().find(|e| e.public_id == public_id).cloned();
        Ok(event)
    }

    async fn list_open_events(&self, today: NaiveDate) -> Result<Vec<Event>> {
        let events = self.events.lock().unwrap();
        let mut listed: Vec<Event> = events
            .values()
            .filter(|e| e.registration_open && e.ends_on >= today)
            .cloned()
            .collect();
        listed.sort_by_key(|e| e.starts_on);
        Ok(listed)
    }

    async fn list_events_for_participant(
        &self,
        participant_id: i64,
        ending_on_or_after: Option<NaiveDate>,
    ) -> Result<Vec<Event>> {
        let registered_event_ids: Vec<i64> = {
            let registrations = self.registrations.lock().unwrap();
            registrations
                .iter()
                .filter(|r| r.participant_id == participant_id)
                .map(|r| r.event_id)
                .collect()
        };

        let events = self.events.lock().unwrap();
        let mut listed: Vec<Event> = events
            .values()
            .filter(|e| e.id.map_or(false, |id| registered_event_ids.contains(&id)))
            .filter(|e| ending_on_or_after.map_or(true, |date| e.ends_on >= date))
            .cloned()
            .collect();

        match ending_on_or_after {
            Some(_) => listed.sort_by_key(|e| e.starts_on),
            None => listed.sort_by(|a, b| b.starts_on.cmp(&a.starts_on)),
        }
        Ok(listed)
    }

    async fn create_registration(&self, registration: &Registration) -> Result<()> {
        let mut registrations = self.registrations.lock().unwrap();
        if registrations.iter().any(|r| {
            r.participant_id == registration.participant_id && r.event_id == registration.event_id
        }) {
            return Err(AppError::Conflict(
                "Participant is already registered for this event.".to_string(),
            ));
        }
        registrations.push(registration.clone());

        debug!(
            "Registered participant {} for event {}",
            registration.participant_id, registration.event_id
        );
        Ok(())
    }

    async fn registration_exists(&self, participant_id: i64, event_id: i64) -> Result<bool> {
        let registrations = self.registrations.lock().unwrap();
        Ok(registrations
            .iter()
            .any(|r| r.participant_id == participant_id && r.event_id == event_id))
    }
}
