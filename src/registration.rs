use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::models::{Catalog, Participant, ParticipantArgs};
use crate::reconciler::CatalogReconciler;
use crate::security;
use crate::storage::Storage;

/// Validated participant registration input
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub password: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    pub occupation_other: Option<String>,
    pub specific_needs: Vec<i64>,
    pub custom_needs: Vec<String>,
}

/// Validated participant update input
#[derive(Debug, Clone)]
pub struct ParticipantUpdate {
    pub first_name: String,
    pub last_name: String,
    pub cpf: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub occupation_id: i64,
    pub specific_needs: Vec<i64>,
}

/// Orchestrates participant registration: duplicate checks, catalog
/// reconciliation, password hashing and persistence.
pub struct RegistrationService {
    storage: Arc<dyn Storage>,
    reconciler: CatalogReconciler,
}

impl std::fmt::Debug for RegistrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationService")
            .field("storage", &"<Arc<dyn Storage>>")
            .finish()
    }
}

impl RegistrationService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            reconciler: CatalogReconciler::new(storage.clone()),
            storage,
        }
    }

    /// Register a new participant. The occupation selection and the
    /// specific-need selections both run through the catalog reconciler, so
    /// free-text "other" values end up attached to stable catalog entries.
    #[instrument(skip(self, input))]
    pub async fn create_participant(&self, input: NewParticipant) -> Result<Participant> {
        // An administrator's email can never double as a participant account
        if self
            .storage
            .get_administrator_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(AppError::Validation("Email already registered.".to_string()));
        }
        if self
            .storage
            .get_participant_by_cpf(&input.cpf)
            .await?
            .is_some()
        {
            return Err(AppError::Validation("CPF already registered.".to_string()));
        }
        if self
            .storage
            .get_participant_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(AppError::Validation("Email already registered.".to_string()));
        }

        let occupation_id = self
            .reconciler
            .resolve_occupation(input.occupation_id, input.occupation_other.as_deref())
            .await?;
        let need_ids = self
            .reconciler
            .resolve_specific_needs(&input.specific_needs, &input.custom_needs)
            .await?;

        let mut participant = Participant::new(ParticipantArgs {
            first_name: input.first_name,
            last_name: input.last_name,
            cpf: input.cpf,
            email: input.email,
            password_hash: security::hash_password(&input.password),
            birth_date: input.birth_date,
            occupation_id,
            need_ids,
        });
        self.storage.create_participant(&mut participant).await?;

        info!(public_id = %participant.public_id, "Registered participant");
        crate::metrics::participant_registered();
        Ok(participant)
    }

    /// Update a participant's own record. Selections are taken as plain
    /// catalog ids here; they are verified to exist but no free-text
    /// reconciliation applies.
    #[instrument(skip(self, existing, update))]
    pub async fn update_participant(
        &self,
        existing: &Participant,
        update: ParticipantUpdate,
    ) -> Result<Participant> {
        if self
            .storage
            .find_catalog_entry_by_id(Catalog::Occupation, update.occupation_id)
            .await?
            .is_none()
        {
            return Err(AppError::UnknownReference(
                "The occupation id does not exist.".to_string(),
            ));
        }
        for &need_id in &update.specific_needs {
            if self
                .storage
                .find_catalog_entry_by_id(Catalog::SpecificNeed, need_id)
                .await?
                .is_none()
            {
                return Err(AppError::UnknownReference(
                    "The specific-need id does not exist.".to_string(),
                ));
            }
        }

        let mut updated = existing.clone();
        updated.first_name = update.first_name;
        updated.last_name = update.last_name;
        updated.cpf = update.cpf;
        updated.email = update.email;
        updated.birth_date = update.birth_date;
        updated.occupation_id = update.occupation_id;
        updated.need_ids = dedupe(update.specific_needs);

        self.storage.update_participant(&updated).await?;

        info!(public_id = %updated.public_id, "Updated participant");
        Ok(updated)
    }
}

fn dedupe(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}
