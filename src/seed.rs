use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::models::{Administrator, Catalog, CatalogEntry};
use crate::security;
use crate::storage::Storage;

// Canonical occupations offered on the registration form. The final entry
// is the sentinel that unlocks the free-text field.
const OCCUPATIONS: &[&str] = &[
    // Education
    "Student",
    "Teacher",
    "Researcher",
    "Educational Coordinator",
    "School Monitor",
    "Librarian",
    "Sign Language Interpreter",
    // Health
    "Physician",
    "Nurse",
    "Physiotherapist",
    "Psychologist",
    "Occupational Therapist",
    "Nutritionist",
    "Pharmacist",
    "Dentist",
    "Social Worker",
    "Caregiver",
    // Information technology
    "Software Developer",
    "Computer Engineer",
    "Data Analyst",
    "Data Scientist",
    "Network Administrator",
    "IT Support Technician",
    "Information Security Specialist",
    "UX/UI Designer",
    "Digital Accessibility Specialist",
    // Law
    "Lawyer",
    "Public Defender",
    "Judge",
    // Arts, culture and communication
    "Artist",
    "Musician",
    "Writer",
    "Journalist",
    "Cultural Producer",
    "Event Producer",
    "Photographer",
    // Engineering and construction
    "Civil Engineer",
    "Architect",
    "Electrician",
    "Mechanic",
    // Sentinel
    "Other",
];

// Canonical specific needs. The final entry is the sentinel.
const SPECIFIC_NEEDS: &[&str] = &[
    // Disabilities
    "Hearing Impairment",
    "Visual Impairment",
    "Physical Disability",
    "Intellectual Disability",
    "Multiple Disabilities",
    "Speech Impairment",
    // Neurodivergences
    "Autism Spectrum Disorder",
    "Attention Deficit Disorder",
    "Learning Difficulty",
    "Mental Health Condition",
    // Specific syndromes
    "Down Syndrome",
    "Rett Syndrome",
    "Williams Syndrome",
    // Chronic health conditions
    "Chronic Illness",
    "Diabetes",
    "Epilepsy",
    // Mobility and accessibility
    "Reduced Mobility",
    "Wheelchair User",
    // Support
    "Psychological Support Request",
    // Sentinel
    "Others",
];

/// Summary of what a seeding run actually inserted
#[derive(Debug, Default)]
pub struct SeedReport {
    pub occupations_created: usize,
    pub needs_created: usize,
}

/// Idempotently populate both catalogs with their canonical entries,
/// skipping names that are already present.
pub async fn seed_catalogs(storage: Arc<dyn Storage>) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for name in OCCUPATIONS {
        if insert_if_absent(&storage, Catalog::Occupation, name).await? {
            report.occupations_created += 1;
        }
    }
    for name in SPECIFIC_NEEDS {
        if insert_if_absent(&storage, Catalog::SpecificNeed, name).await? {
            report.needs_created += 1;
        }
    }

    info!(
        occupations = report.occupations_created,
        needs = report.needs_created,
        "Seeded canonical catalogs"
    );
    Ok(report)
}

async fn insert_if_absent(
    storage: &Arc<dyn Storage>,
    catalog: Catalog,
    name: &str,
) -> Result<bool> {
    if storage.find_catalog_entry(catalog, name, false).await?.is_some() {
        return Ok(false);
    }
    let mut entry = CatalogEntry::canonical(name);
    storage.insert_catalog_entry(catalog, &mut entry).await?;
    Ok(true)
}

/// Create an administrator account unless the email is already taken.
/// Returns the created account, or None when it already existed.
pub async fn create_administrator(
    storage: Arc<dyn Storage>,
    name: String,
    email: String,
    password: &str,
) -> Result<Option<Administrator>> {
    if storage.get_administrator_by_email(&email).await?.is_some() {
        return Ok(None);
    }

    let administrator = Administrator::new(name, email, security::hash_password(password));
    storage.create_administrator(&administrator).await?;

    info!(id = %administrator.id, "Created administrator");
    Ok(Some(administrator))
}
