use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Administrator, CatalogEntry, Event, EventArgs, Participant};
use crate::registration::{NewParticipant, ParticipantUpdate};
use crate::validators::{
    validate_birth_date, validate_cpf, validate_custom_label, validate_custom_needs,
    validate_email, validate_name, validate_password,
};

/// Participant registration payload
#[derive(Debug, Deserialize)]
pub struct RegisterParticipantRequest {
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub password: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    #[serde(default)]
    pub occupation_other: Option<String>,
    #[serde(default)]
    pub specific_needs: Vec<i64>,
    #[serde(default)]
    pub custom_needs: Vec<String>,
}

impl RegisterParticipantRequest {
    /// Validate every field and normalize the free-text values
    pub fn into_new_participant(self) -> Result<NewParticipant> {
        let first_name = validate_name("First name", &self.first_name)?;
        let last_name = validate_name("Last name", &self.last_name)?;
        let cpf = validate_cpf(&self.cpf)?;
        let email = validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_birth_date(self.birth_date)?;

        let occupation_other = match self.occupation_other.as_deref() {
            Some(text) => {
                let formatted = validate_custom_label("occupation_other", text)?;
                (!formatted.is_empty()).then_some(formatted)
            }
            None => None,
        };
        let custom_needs = validate_custom_needs(&self.custom_needs)?;

        Ok(NewParticipant {
            first_name,
            last_name,
            cpf,
            email,
            password: self.password,
            birth_date: self.birth_date,
            occupation_id: self.occupation_id,
            occupation_other,
            specific_needs: self.specific_needs,
            custom_needs,
        })
    }
}

/// Participant self-update payload
#[derive(Debug, Deserialize)]
pub struct UpdateParticipantRequest {
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    #[serde(default)]
    pub specific_needs: Vec<i64>,
}

impl UpdateParticipantRequest {
    pub fn into_update(self) -> Result<ParticipantUpdate> {
        let first_name = validate_name("First name", &self.first_name)?;
        let last_name = validate_name("Last name", &self.last_name)?;
        let cpf = validate_cpf(&self.cpf)?;
        let email = validate_email(&self.email)?;
        validate_birth_date(self.birth_date)?;

        Ok(ParticipantUpdate {
            first_name,
            last_name,
            cpf,
            email,
            birth_date: self.birth_date,
            occupation_id: self.occupation_id,
            specific_needs: self.specific_needs,
        })
    }
}

/// Participant view without internal ids
#[derive(Debug, Serialize)]
pub struct ParticipantPublic {
    pub public_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    pub specific_needs: Vec<i64>,
}

impl ParticipantPublic {
    pub fn from_model(participant: &Participant) -> Self {
        Self {
            public_id: participant.public_id,
            first_name: participant.first_name.clone(),
            last_name: participant.last_name.clone(),
            cpf: participant.cpf.clone(),
            email: participant.email.clone(),
            birth_date: participant.birth_date,
            occupation_id: participant.occupation_id,
            specific_needs: participant.need_ids.clone(),
        }
    }
}

/// Participant view for administrators, internal id included
#[derive(Debug, Serialize)]
pub struct ParticipantPrivate {
    pub id: i64,
    pub public_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    pub specific_needs: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl ParticipantPrivate {
    pub fn from_model(participant: &Participant) -> Self {
        Self {
            id: participant.id.unwrap_or_default(),
            public_id: participant.public_id,
            first_name: participant.first_name.clone(),
            last_name: participant.last_name.clone(),
            cpf: participant.cpf.clone(),
            email: participant.email.clone(),
            birth_date: participant.birth_date,
            occupation_id: participant.occupation_id,
            specific_needs: participant.need_ids.clone(),
            created_at: participant.created_at,
        }
    }
}

/// One page of the administrator participant listing
#[derive(Debug, Serialize)]
pub struct ParticipantPage {
    pub total: usize,
    pub page: usize,
    pub size: usize,
    pub participants: Vec<ParticipantPrivate>,
}

/// Registration response: the created participant plus their first token
#[derive(Debug, Serialize)]
pub struct RegisteredParticipant {
    #[serde(flatten)]
    pub participant: ParticipantPrivate,
    pub access_token: String,
    pub token_type: String,
}

/// Login form body (username is an email, or a CPF for participants)
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn new(message: &str, access_token: String) -> Self {
        Self {
            message: message.to_string(),
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Catalog entry as shown to participants picking from a list
#[derive(Debug, Serialize)]
pub struct CatalogEntryPublic {
    pub id: i64,
    pub name: String,
}

impl CatalogEntryPublic {
    pub fn from_model(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.unwrap_or_default(),
            name: entry.name.clone(),
        }
    }
}

/// Catalog entry as shown to administrators
#[derive(Debug, Serialize)]
pub struct CatalogEntryPrivate {
    pub id: i64,
    pub name: String,
    pub is_custom: bool,
}

impl CatalogEntryPrivate {
    pub fn from_model(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.unwrap_or_default(),
            name: entry.name.clone(),
            is_custom: entry.is_custom,
        }
    }
}

/// Admin catalog-create body; accepts a single name or a list of names
#[derive(Debug, Deserialize)]
pub struct CreateCatalogEntryRequest {
    pub name: NameOrNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NameOrNames {
    One(String),
    Many(Vec<String>),
}

impl NameOrNames {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            NameOrNames::One(name) => vec![name],
            NameOrNames::Many(names) => names,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCatalogEntryRequest {
    pub name: String,
}

/// Event as listed publicly
#[derive(Debug, Serialize)]
pub struct EventPublic {
    pub public_id: Uuid,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub registration_open: bool,
}

impl EventPublic {
    pub fn from_model(event: &Event) -> Self {
        Self {
            public_id: event.public_id,
            name: event.name.clone(),
            category: event.category.clone(),
            subcategory: event.subcategory.clone(),
            description: event.description.clone(),
            starts_on: event.starts_on,
            ends_on: event.ends_on,
            registration_open: event.registration_open,
        }
    }
}

/// Admin event-create body
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    #[serde(default = "default_registration_open")]
    pub registration_open: bool,
}

fn default_registration_open() -> bool {
    true
}

impl CreateEventRequest {
    pub fn into_args(self) -> EventArgs {
        EventArgs {
            name: self.name,
            category: self.category,
            subcategory: self.subcategory,
            description: self.description,
            starts_on: self.starts_on,
            ends_on: self.ends_on,
            registration_open: self.registration_open,
        }
    }
}

/// Answer to "is this participant registered for that event?"
#[derive(Debug, Serialize)]
pub struct RegistrationStatus {
    pub event_id: Uuid,
    pub event_name: String,
    pub registered: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdministratorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdministratorPublic {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl AdministratorPublic {
    pub fn from_model(administrator: &Administrator) -> Self {
        Self {
            id: administrator.id,
            name: administrator.name.clone(),
            email: administrator.email.clone(),
            created_at: administrator.created_at,
        }
    }
}

/// Plain message body used by detail-only responses
#[derive(Debug, Serialize)]
pub struct Detail {
    pub detail: String,
}

impl Detail {
    pub fn new(detail: &str) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}

/// Page selection for the admin participant listing
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
}

fn default_page() -> usize {
    1
}

fn default_size() -> usize {
    20
}
