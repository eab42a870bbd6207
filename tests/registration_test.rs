use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;

use event_checkin::config::Settings;
use event_checkin::constants::{OCCUPATION_OTHER, SPECIFIC_NEED_OTHER};
use event_checkin::error::AppError;
use event_checkin::models::{Catalog, Event, EventArgs, Registration};
use event_checkin::registration::{NewParticipant, ParticipantUpdate, RegistrationService};
use event_checkin::security::{self, CurrentUser};
use event_checkin::seed;
use event_checkin::storage::{InMemoryStorage, Storage};

fn birth_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()
}

async fn seeded_storage() -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    seed::seed_catalogs(storage.clone()).await?;
    Ok(storage)
}

async fn sentinel_id(storage: &Arc<dyn Storage>, catalog: Catalog) -> Result<i64> {
    let name = match catalog {
        Catalog::Occupation => OCCUPATION_OTHER,
        Catalog::SpecificNeed => SPECIFIC_NEED_OTHER,
    };
    let entry = storage
        .find_catalog_entry(catalog, name, false)
        .await?
        .expect("seeded catalogs carry their sentinel");
    Ok(entry.id.unwrap())
}

fn new_participant(occupation_id: i64) -> NewParticipant {
    NewParticipant {
        first_name: "Ana".to_string(),
        last_name: "Silva".to_string(),
        cpf: "52998224725".to_string(),
        email: "ana@example.com".to_string(),
        password: "Miojo*123".to_string(),
        birth_date: birth_date(),
        occupation_id,
        occupation_other: None,
        specific_needs: Vec::new(),
        custom_needs: Vec::new(),
    }
}

#[tokio::test]
async fn registers_a_participant_with_custom_occupation_and_needs() -> Result<()> {
    let storage = seeded_storage().await?;
    let service = RegistrationService::new(storage.clone());

    let occupation_sentinel = sentinel_id(&storage, Catalog::Occupation).await?;
    let need_sentinel = sentinel_id(&storage, Catalog::SpecificNeed).await?;

    let mut input = new_participant(occupation_sentinel);
    input.occupation_other = Some("beekeeper of the valley".to_string());
    input.specific_needs = vec![need_sentinel];
    input.custom_needs = vec!["Quiet Room".to_string()];

    let participant = service.create_participant(input).await?;

    assert!(participant.id.is_some());
    assert!(security::verify_password("Miojo*123", &participant.password_hash));

    let occupation = storage
        .find_catalog_entry_by_id(Catalog::Occupation, participant.occupation_id)
        .await?
        .expect("resolved occupation should exist");
    assert_eq!(occupation.name, "Beekeeper of the Valley");
    assert!(occupation.is_custom);

    assert_eq!(participant.need_ids.len(), 1);
    let need = storage
        .find_catalog_entry_by_id(Catalog::SpecificNeed, participant.need_ids[0])
        .await?
        .expect("resolved need should exist");
    assert_eq!(need.name, "Quiet Room");
    assert!(need.is_custom);

    // The stored record matches what the service returned
    let stored = storage
        .get_participant_by_public_id(participant.public_id)
        .await?
        .expect("participant should be persisted");
    assert_eq!(stored.email, "ana@example.com");
    Ok(())
}

#[tokio::test]
async fn duplicate_cpf_and_email_are_rejected() -> Result<()> {
    let storage = seeded_storage().await?;
    let service = RegistrationService::new(storage.clone());

    let occupation_sentinel = sentinel_id(&storage, Catalog::Occupation).await?;
    let mut first = new_participant(occupation_sentinel);
    first.occupation_other = Some("astronaut".to_string());
    service.create_participant(first).await?;

    // Same CPF, different email
    let mut same_cpf = new_participant(occupation_sentinel);
    same_cpf.occupation_other = Some("astronaut".to_string());
    same_cpf.email = "other@example.com".to_string();
    let result = service.create_participant(same_cpf).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // Same email, different CPF
    let mut same_email = new_participant(occupation_sentinel);
    same_email.occupation_other = Some("astronaut".to_string());
    same_email.cpf = "11144477735".to_string();
    let result = service.create_participant(same_email).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn administrator_emails_cannot_register_as_participants() -> Result<()> {
    let storage = seeded_storage().await?;
    seed::create_administrator(
        storage.clone(),
        "Admin".to_string(),
        "admin@example.com".to_string(),
        "Miojo*123",
    )
    .await?;

    let service = RegistrationService::new(storage.clone());
    let occupation_sentinel = sentinel_id(&storage, Catalog::Occupation).await?;

    let mut input = new_participant(occupation_sentinel);
    input.occupation_other = Some("astronaut".to_string());
    input.email = "admin@example.com".to_string();

    let result = service.create_participant(input).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn issued_tokens_resolve_back_to_their_owner() -> Result<()> {
    let storage = seeded_storage().await?;
    let service = RegistrationService::new(storage.clone());
    let settings = Settings::for_tests("integration-test-secret");

    let occupation_sentinel = sentinel_id(&storage, Catalog::Occupation).await?;
    let mut input = new_participant(occupation_sentinel);
    input.occupation_other = Some("astronaut".to_string());
    let participant = service.create_participant(input).await?;

    let token =
        security::create_access_token(&settings, &participant.public_id.to_string(), false)?;
    match security::current_user(&storage, &settings, &token).await? {
        CurrentUser::Participant(found) => {
            assert_eq!(found.public_id, participant.public_id);
        }
        CurrentUser::Administrator(_) => panic!("expected a participant"),
    }

    // A token signed with another secret is rejected
    let other_settings = Settings::for_tests("another-secret");
    let result = security::current_user(&storage, &other_settings, &token).await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn updates_validate_catalog_references() -> Result<()> {
    let storage = seeded_storage().await?;
    let service = RegistrationService::new(storage.clone());

    let occupation_sentinel = sentinel_id(&storage, Catalog::Occupation).await?;
    let mut input = new_participant(occupation_sentinel);
    input.occupation_other = Some("astronaut".to_string());
    let participant = service.create_participant(input).await?;

    let update = ParticipantUpdate {
        first_name: "Ana".to_string(),
        last_name: "Silva".to_string(),
        cpf: participant.cpf.clone(),
        email: participant.email.clone(),
        birth_date: participant.birth_date,
        occupation_id: 9999,
        specific_needs: Vec::new(),
    };
    let result = service.update_participant(&participant, update).await;
    assert!(matches!(result, Err(AppError::UnknownReference(_))));
    Ok(())
}

#[tokio::test]
async fn event_registration_is_unique_per_participant() -> Result<()> {
    let storage = seeded_storage().await?;
    let service = RegistrationService::new(storage.clone());

    let occupation_sentinel = sentinel_id(&storage, Catalog::Occupation).await?;
    let mut input = new_participant(occupation_sentinel);
    input.occupation_other = Some("astronaut".to_string());
    let participant = service.create_participant(input).await?;
    let participant_id = participant.id.unwrap();

    let mut event = Event::new(EventArgs {
        name: "Accessibility Conference".to_string(),
        category: "Conference".to_string(),
        subcategory: "Technology".to_string(),
        description: "Annual accessibility conference".to_string(),
        starts_on: NaiveDate::from_ymd_opt(2030, 5, 1).unwrap(),
        ends_on: NaiveDate::from_ymd_opt(2030, 5, 3).unwrap(),
        registration_open: true,
    });
    storage.create_event(&mut event).await?;
    let event_id = event.id.unwrap();

    storage
        .create_registration(&Registration::new(participant_id, event_id))
        .await?;
    assert!(storage.registration_exists(participant_id, event_id).await?);

    let duplicate = storage
        .create_registration(&Registration::new(participant_id, event_id))
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let upcoming = storage
        .list_events_for_participant(participant_id, Some(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()))
        .await?;
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].name, "Accessibility Conference");
    Ok(())
}
