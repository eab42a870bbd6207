use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{OCCUPATION_OTHER, SPECIFIC_NEED_OTHER};

/// The two independent reference catalogs participants pick from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Catalog {
    Occupation,
    SpecificNeed,
}

impl Catalog {
    /// Name of the catalog's canonical "Other" entry
    pub fn sentinel_name(self) -> &'static str {
        match self {
            Catalog::Occupation => OCCUPATION_OTHER,
            Catalog::SpecificNeed => SPECIFIC_NEED_OTHER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Catalog::Occupation => "occupation",
            Catalog::SpecificNeed => "specific_need",
        }
    }
}

/// A selectable label in one of the catalogs. Canonical entries are seeded
/// by administrators; custom entries are created from participant free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Option<i64>,
    pub name: String,
    pub is_custom: bool,
}

impl CatalogEntry {
    pub fn canonical(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            is_custom: false,
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            is_custom: true,
        }
    }
}

/// A registered participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Option<i64>,
    pub public_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    pub need_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

/// Arguments for creating a participant
#[derive(Debug, Clone)]
pub struct ParticipantArgs {
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    pub need_ids: Vec<i64>,
}

impl Participant {
    /// Create a new participant with a fresh public id
    pub fn new(args: ParticipantArgs) -> Self {
        Self {
            id: None,
            public_id: Uuid::new_v4(),
            first_name: args.first_name,
            last_name: args.last_name,
            cpf: args.cpf,
            email: args.email,
            password_hash: args.password_hash,
            birth_date: args.birth_date,
            occupation_id: args.occupation_id,
            need_ids: args.need_ids,
            created_at: Utc::now(),
        }
    }
}

/// An administrator account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Administrator {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Administrator {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// An event participants can register for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    pub public_id: Uuid,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub registration_open: bool,
}

/// Arguments for creating an event
#[derive(Debug, Clone)]
pub struct EventArgs {
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub description: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub registration_open: bool,
}

impl Event {
    /// Create a new event with a fresh public id
    pub fn new(args: EventArgs) -> Self {
        Self {
            id: None,
            public_id: Uuid::new_v4(),
            name: args.name,
            category: args.category,
            subcategory: args.subcategory,
            description: args.description,
            starts_on: args.starts_on,
            ends_on: args.ends_on,
            registration_open: args.registration_open,
        }
    }
}

/// A participant's registration for an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub participant_id: i64,
    pub event_id: i64,
    pub registered_at: DateTime<Utc>,
}

impl Registration {
    pub fn new(participant_id: i64, event_id: i64) -> Self {
        Self {
            participant_id,
            event_id,
            registered_at: Utc::now(),
        }
    }
}
