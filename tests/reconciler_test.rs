use anyhow::Result;
use std::sync::Arc;

use event_checkin::error::AppError;
use event_checkin::models::{Catalog, CatalogEntry};
use event_checkin::reconciler::CatalogReconciler;
use event_checkin::storage::{InMemoryStorage, Storage};

/// Storage with a small occupation catalog (Teacher + the "Other" sentinel)
/// and a needs catalog (Hearing Impairment + the "Others" sentinel).
async fn seeded_storage() -> Result<(Arc<dyn Storage>, SeededIds)> {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());

    let mut teacher = CatalogEntry::canonical("Teacher");
    storage
        .insert_catalog_entry(Catalog::Occupation, &mut teacher)
        .await?;
    let mut occupation_other = CatalogEntry::canonical("Other");
    storage
        .insert_catalog_entry(Catalog::Occupation, &mut occupation_other)
        .await?;

    let mut hearing = CatalogEntry::canonical("Hearing Impairment");
    storage
        .insert_catalog_entry(Catalog::SpecificNeed, &mut hearing)
        .await?;
    let mut need_other = CatalogEntry::canonical("Others");
    storage
        .insert_catalog_entry(Catalog::SpecificNeed, &mut need_other)
        .await?;

    let ids = SeededIds {
        teacher: teacher.id.unwrap(),
        occupation_other: occupation_other.id.unwrap(),
        hearing: hearing.id.unwrap(),
        need_other: need_other.id.unwrap(),
    };
    Ok((storage, ids))
}

struct SeededIds {
    teacher: i64,
    occupation_other: i64,
    hearing: i64,
    need_other: i64,
}

async fn occupation_count(storage: &Arc<dyn Storage>) -> Result<usize> {
    Ok(storage
        .list_catalog_entries(Catalog::Occupation, false)
        .await?
        .len())
}

#[tokio::test]
async fn free_text_matching_a_canonical_entry_reuses_it() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let before = occupation_count(&storage).await?;
    let resolved = reconciler
        .resolve_occupation(ids.occupation_other, Some("teacher"))
        .await?;

    assert_eq!(resolved, ids.teacher);
    assert_eq!(occupation_count(&storage).await?, before);
    Ok(())
}

#[tokio::test]
async fn unmatched_free_text_creates_a_custom_entry() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let resolved = reconciler
        .resolve_occupation(ids.occupation_other, Some("Astronaut"))
        .await?;

    let created = storage
        .find_catalog_entry_by_id(Catalog::Occupation, resolved)
        .await?
        .expect("created entry should exist");
    assert_eq!(created.name, "Astronaut");
    assert!(created.is_custom);
    Ok(())
}

#[tokio::test]
async fn resolving_the_same_label_twice_creates_nothing_new() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let first = reconciler
        .resolve_occupation(ids.occupation_other, Some("Astronaut"))
        .await?;
    let count_after_first = occupation_count(&storage).await?;

    let second = reconciler
        .resolve_occupation(ids.occupation_other, Some("Astronaut"))
        .await?;

    assert_eq!(first, second);
    assert_eq!(occupation_count(&storage).await?, count_after_first);
    Ok(())
}

#[tokio::test]
async fn labels_normalizing_to_the_same_name_resolve_to_one_entry() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let first = reconciler
        .resolve_occupation(ids.occupation_other, Some("  teacher "))
        .await?;
    let second = reconciler
        .resolve_occupation(ids.occupation_other, Some("Teacher"))
        .await?;

    assert_eq!(first, ids.teacher);
    assert_eq!(second, ids.teacher);
    Ok(())
}

#[tokio::test]
async fn sentinel_without_free_text_is_rejected() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage);

    let blank = reconciler
        .resolve_occupation(ids.occupation_other, Some("   "))
        .await;
    assert!(matches!(blank, Err(AppError::MissingRequiredOverride(_))));

    let missing = reconciler.resolve_occupation(ids.occupation_other, None).await;
    assert!(matches!(missing, Err(AppError::MissingRequiredOverride(_))));
    Ok(())
}

#[tokio::test]
async fn free_text_is_ignored_for_non_sentinel_selections() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let before = occupation_count(&storage).await?;
    let resolved = reconciler
        .resolve_occupation(ids.teacher, Some("Astronaut"))
        .await?;

    assert_eq!(resolved, ids.teacher);
    assert_eq!(occupation_count(&storage).await?, before);
    Ok(())
}

#[tokio::test]
async fn unknown_selected_id_is_rejected() -> Result<()> {
    let (storage, _ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage);

    let result = reconciler.resolve_occupation(9999, None).await;
    assert!(matches!(result, Err(AppError::UnknownReference(_))));
    Ok(())
}

#[tokio::test]
async fn needs_sentinel_without_custom_needs_is_rejected() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage);

    let empty = reconciler
        .resolve_specific_needs(&[ids.need_other], &[])
        .await;
    assert!(matches!(empty, Err(AppError::MissingRequiredOverride(_))));

    let blank_only = reconciler
        .resolve_specific_needs(&[ids.need_other], &["   ".to_string()])
        .await;
    assert!(matches!(blank_only, Err(AppError::MissingRequiredOverride(_))));
    Ok(())
}

#[tokio::test]
async fn needs_resolution_mixes_ids_and_free_text() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let resolved = reconciler
        .resolve_specific_needs(
            &[ids.hearing, ids.need_other],
            &["sign language interpreter".to_string()],
        )
        .await?;

    // The sentinel id itself never lands in the result
    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0], ids.hearing);

    let created = storage
        .find_catalog_entry_by_id(Catalog::SpecificNeed, resolved[1])
        .await?
        .expect("created entry should exist");
    assert_eq!(created.name, "Sign Language Interpreter");
    assert!(created.is_custom);
    Ok(())
}

#[tokio::test]
async fn needs_result_is_deduplicated() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage);

    // The free text normalizes to an entry that is already selected by id
    let resolved = reconciler
        .resolve_specific_needs(
            &[ids.hearing, ids.need_other],
            &["hearing impairment".to_string()],
        )
        .await?;

    assert_eq!(resolved, vec![ids.hearing]);
    Ok(())
}

#[tokio::test]
async fn unknown_need_id_is_rejected() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage);

    let result = reconciler
        .resolve_specific_needs(&[ids.hearing, 9999], &[])
        .await;
    assert!(matches!(result, Err(AppError::UnknownReference(_))));
    Ok(())
}

#[tokio::test]
async fn needs_free_text_reuses_existing_custom_entries() -> Result<()> {
    let (storage, ids) = seeded_storage().await?;
    let reconciler = CatalogReconciler::new(storage.clone());

    let first = reconciler
        .resolve_specific_needs(&[ids.need_other], &["quiet room".to_string()])
        .await?;
    let needs_before = storage
        .list_catalog_entries(Catalog::SpecificNeed, false)
        .await?
        .len();

    let second = reconciler
        .resolve_specific_needs(&[ids.need_other], &["  QUIET   ROOM ".to_string()])
        .await?;

    assert_eq!(first, second);
    assert_eq!(
        storage
            .list_catalog_entries(Catalog::SpecificNeed, false)
            .await?
            .len(),
        needs_before
    );
    Ok(())
}

#[tokio::test]
async fn without_a_sentinel_overrides_are_discarded() -> Result<()> {
    // A catalog with no "Other" entry configured: free text never applies
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let mut teacher = CatalogEntry::canonical("Teacher");
    storage
        .insert_catalog_entry(Catalog::Occupation, &mut teacher)
        .await?;
    let teacher_id = teacher.id.unwrap();

    let reconciler = CatalogReconciler::new(storage.clone());
    let resolved = reconciler
        .resolve_occupation(teacher_id, Some("Astronaut"))
        .await?;

    assert_eq!(resolved, teacher_id);
    assert_eq!(occupation_count(&storage).await?, 1);
    Ok(())
}
