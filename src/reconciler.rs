use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::{AppError, Result};
use crate::models::{Catalog, CatalogEntry};
use crate::storage::Storage;
use crate::validators::format_with_connectives;

/// Resolves user-supplied catalog selections (a selected id plus optional
/// free-text "other" values) to persisted catalog entry ids, creating custom
/// entries on demand while reusing existing canonical or custom entries.
///
/// Lookups and the conditional insert run against the caller's storage
/// handle; nothing is cached between invocations.
pub struct CatalogReconciler {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for CatalogReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogReconciler")
            .field("storage", &"<Arc<dyn Storage>>")
            .finish()
    }
}

impl CatalogReconciler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Id of the catalog's canonical "Other" entry, when one is configured
    async fn sentinel_id(&self, catalog: Catalog) -> Result<Option<i64>> {
        let sentinel = self
            .storage
            .find_catalog_entry(catalog, catalog.sentinel_name(), false)
            .await?;
        Ok(sentinel.and_then(|entry| entry.id))
    }

    /// Resolve a participant's occupation selection.
    ///
    /// Selecting the "Other" sentinel requires a usable free-text value; for
    /// any other selection the free text is discarded and the selected id is
    /// validated against the catalog.
    #[instrument(skip(self, free_text))]
    pub async fn resolve_occupation(
        &self,
        selected_id: i64,
        free_text: Option<&str>,
    ) -> Result<i64> {
        let sentinel_id = self.sentinel_id(Catalog::Occupation).await?;

        let mut override_text = free_text.map(str::trim).unwrap_or("");
        if sentinel_id == Some(selected_id) {
            if override_text.is_empty() {
                return Err(AppError::MissingRequiredOverride(
                    "A free-text occupation is required when 'Other' is selected.".to_string(),
                ));
            }
        } else {
            // Free text only applies to the sentinel
            override_text = "";
        }

        if !override_text.is_empty() {
            return self.resolve_label(Catalog::Occupation, override_text).await;
        }

        match self
            .storage
            .find_catalog_entry_by_id(Catalog::Occupation, selected_id)
            .await?
        {
            Some(_) => Ok(selected_id),
            None => Err(AppError::UnknownReference(
                "The occupation id does not exist.".to_string(),
            )),
        }
    }

    /// Resolve a participant's specific-need selections plus any free-text
    /// custom needs into a deduplicated list of catalog ids.
    ///
    /// The sentinel id itself is never part of the result; selecting it only
    /// requires that at least one usable free-text need accompanies it.
    #[instrument(skip(self, free_text))]
    pub async fn resolve_specific_needs(
        &self,
        selected_ids: &[i64],
        free_text: &[String],
    ) -> Result<Vec<i64>> {
        let sentinel_id = self.sentinel_id(Catalog::SpecificNeed).await?;

        if sentinel_id.map_or(false, |id| selected_ids.contains(&id))
            && !free_text.iter().any(|text| !text.trim().is_empty())
        {
            return Err(AppError::MissingRequiredOverride(
                "Provide at least one custom need when 'Others' is selected.".to_string(),
            ));
        }

        let mut need_ids = Vec::new();

        for &selected in selected_ids {
            if sentinel_id == Some(selected) {
                continue;
            }
            if self
                .storage
                .find_catalog_entry_by_id(Catalog::SpecificNeed, selected)
                .await?
                .is_none()
            {
                return Err(AppError::UnknownReference(
                    "The specific-need id does not exist.".to_string(),
                ));
            }
            if !need_ids.contains(&selected) {
                need_ids.push(selected);
            }
        }

        for text in free_text {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let id = self.resolve_label(Catalog::SpecificNeed, trimmed).await?;
            if !need_ids.contains(&id) {
                need_ids.push(id);
            }
        }

        Ok(need_ids)
    }

    /// Match a formatted label against canonical entries, then custom ones,
    /// creating a new custom entry when neither exists.
    async fn resolve_label(&self, catalog: Catalog, label: &str) -> Result<i64> {
        let name = format_with_connectives(label);

        if let Some(canonical) = self
            .storage
            .find_catalog_entry(catalog, &name, false)
            .await?
        {
            debug!(catalog = catalog.as_str(), name = %name, "Matched canonical entry");
            return entry_id(&canonical);
        }

        if let Some(custom) = self.storage.find_catalog_entry(catalog, &name, true).await? {
            debug!(catalog = catalog.as_str(), name = %name, "Matched existing custom entry");
            return entry_id(&custom);
        }

        let mut entry = CatalogEntry::custom(name.clone());
        match self.storage.insert_catalog_entry(catalog, &mut entry).await {
            Ok(()) => {
                info!(catalog = catalog.as_str(), name = %name, "Created custom catalog entry");
                crate::metrics::custom_entry_created(catalog.as_str());
                entry_id(&entry)
            }
            // A concurrent caller created the same name first; use theirs
            Err(AppError::Conflict(_)) => {
                let winner = match self.storage.find_catalog_entry(catalog, &name, true).await? {
                    Some(existing) => existing,
                    None => self
                        .storage
                        .find_catalog_entry(catalog, &name, false)
                        .await?
                        .ok_or_else(|| AppError::Database {
                            message: format!(
                                "Insert of '{name}' conflicted but no entry with that name exists"
                            ),
                        })?,
                };
                entry_id(&winner)
            }
            Err(e) => Err(e),
        }
    }
}

fn entry_id(entry: &CatalogEntry) -> Result<i64> {
    entry.id.ok_or_else(|| AppError::Database {
        message: "Catalog entry is missing its id".to_string(),
    })
}
