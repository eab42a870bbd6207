use axum::extract::{Extension, Form, Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Administrator, Catalog, CatalogEntry, Event, Registration};
use crate::registration::RegistrationService;
use crate::schemas::{
    AdministratorPublic, CatalogEntryPrivate, CatalogEntryPublic, CreateAdministratorRequest,
    CreateCatalogEntryRequest, CreateEventRequest, Detail, EventPublic, LoginRequest, PageQuery,
    ParticipantPage, ParticipantPrivate, ParticipantPublic, RegisterParticipantRequest,
    RegisteredParticipant, RegistrationStatus, TokenResponse, UpdateCatalogEntryRequest,
    UpdateParticipantRequest,
};
use crate::security::{self, CurrentUser};
use crate::server::AppState;
use crate::validators::{validate_email, validate_name, validate_password};

fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Could not validate credentials.".to_string()))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser> {
    let token = bearer_token(headers)?;
    security::current_user(&state.storage, &state.settings, token).await
}

// Landing pages #####

pub async fn index() -> impl IntoResponse {
    "Hello! The event check-in service is up."
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "event-checkin",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// Authentication #####

/// Login with an email (administrators and participants) or a CPF
/// (participants only). Administrators are tried first.
pub async fn login(
    Extension(state): Extension<AppState>,
    Form(form): Form<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    if let Some(administrator) = state
        .storage
        .get_administrator_by_email(&form.username)
        .await?
    {
        if security::verify_password(&form.password, &administrator.password_hash) {
            let token = security::create_access_token(
                &state.settings,
                &administrator.id.to_string(),
                true,
            )?;
            metrics::login_succeeded(true);
            return Ok(Json(TokenResponse::new("Authentication successful!", token)));
        }
    }

    let participant = match state
        .storage
        .get_participant_by_email(&form.username)
        .await?
    {
        Some(found) => Some(found),
        None => state.storage.get_participant_by_cpf(&form.username).await?,
    };

    let Some(participant) = participant else {
        return Err(AppError::Unauthorized(
            "Incorrect CPF/email or password.".to_string(),
        ));
    };
    if !security::verify_password(&form.password, &participant.password_hash) {
        return Err(AppError::Unauthorized(
            "Incorrect CPF/email or password.".to_string(),
        ));
    }

    let token = security::create_access_token(
        &state.settings,
        &participant.public_id.to_string(),
        false,
    )?;
    metrics::login_succeeded(false);
    Ok(Json(TokenResponse::new("Authentication successful!", token)))
}

/// Re-issue a token for the authenticated caller with the refresh window
pub async fn refresh_token(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>> {
    let token = match authenticate(&state, &headers).await? {
        CurrentUser::Administrator(administrator) => {
            security::create_refresh_token(&state.settings, &administrator.id.to_string(), true)?
        }
        CurrentUser::Participant(participant) => security::create_refresh_token(
            &state.settings,
            &participant.public_id.to_string(),
            false,
        )?,
    };
    Ok(Json(TokenResponse::new("Token refreshed successfully!", token)))
}

// Catalogs #####

async fn list_catalog(state: &AppState, catalog: Catalog) -> Result<Json<Vec<CatalogEntryPublic>>> {
    let entries = state.storage.list_catalog_entries(catalog, true).await?;
    Ok(Json(entries.iter().map(CatalogEntryPublic::from_model).collect()))
}

async fn get_catalog_entry(
    state: &AppState,
    catalog: Catalog,
    id: i64,
) -> Result<Json<CatalogEntryPublic>> {
    let entry = state
        .storage
        .find_catalog_entry_by_id(catalog, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Catalog entry not found.".to_string()))?;
    Ok(Json(CatalogEntryPublic::from_model(&entry)))
}

/// Admin-only: insert one or more canonical entries; returns the last one
async fn create_catalog_entries(
    state: &AppState,
    headers: &HeaderMap,
    catalog: Catalog,
    request: CreateCatalogEntryRequest,
) -> Result<(StatusCode, Json<CatalogEntryPrivate>)> {
    authenticate(state, headers).await?.require_administrator()?;

    let names = request.name.into_vec();
    if names.is_empty() {
        return Err(AppError::Validation("Provide at least one name.".to_string()));
    }

    let mut created = None;
    for name in names {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::Validation("Names cannot be empty.".to_string()));
        }
        let mut entry = CatalogEntry::canonical(name);
        state.storage.insert_catalog_entry(catalog, &mut entry).await?;
        created = Some(entry);
    }

    // names is non-empty, so an entry was created on every success path
    let entry = created.ok_or_else(|| AppError::Database {
        message: "No catalog entry was created".to_string(),
    })?;
    Ok((StatusCode::CREATED, Json(CatalogEntryPrivate::from_model(&entry))))
}

async fn update_catalog_entry(
    state: &AppState,
    headers: &HeaderMap,
    catalog: Catalog,
    id: i64,
    request: UpdateCatalogEntryRequest,
) -> Result<Json<CatalogEntryPrivate>> {
    authenticate(state, headers).await?.require_administrator()?;

    let mut entry = state
        .storage
        .find_catalog_entry_by_id(catalog, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Catalog entry not found.".to_string()))?;

    entry.name = request.name;
    state.storage.update_catalog_entry(catalog, &entry).await?;
    Ok(Json(CatalogEntryPrivate::from_model(&entry)))
}

async fn delete_catalog_entry(
    state: &AppState,
    headers: &HeaderMap,
    catalog: Catalog,
    id: i64,
) -> Result<StatusCode> {
    authenticate(state, headers).await?.require_administrator()?;
    state.storage.delete_catalog_entry(catalog, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_occupations(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<CatalogEntryPublic>>> {
    list_catalog(&state, Catalog::Occupation).await
}

pub async fn get_occupation(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CatalogEntryPublic>> {
    get_catalog_entry(&state, Catalog::Occupation, id).await
}

pub async fn create_occupation(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<CatalogEntryPrivate>)> {
    create_catalog_entries(&state, &headers, Catalog::Occupation, request).await
}

pub async fn update_occupation(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<UpdateCatalogEntryRequest>,
) -> Result<Json<CatalogEntryPrivate>> {
    update_catalog_entry(&state, &headers, Catalog::Occupation, id, request).await
}

pub async fn delete_occupation(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    delete_catalog_entry(&state, &headers, Catalog::Occupation, id).await
}

pub async fn list_needs(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<CatalogEntryPublic>>> {
    list_catalog(&state, Catalog::SpecificNeed).await
}

pub async fn get_need(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CatalogEntryPublic>> {
    get_catalog_entry(&state, Catalog::SpecificNeed, id).await
}

pub async fn create_need(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<CatalogEntryPrivate>)> {
    create_catalog_entries(&state, &headers, Catalog::SpecificNeed, request).await
}

pub async fn update_need(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<UpdateCatalogEntryRequest>,
) -> Result<Json<CatalogEntryPrivate>> {
    update_catalog_entry(&state, &headers, Catalog::SpecificNeed, id, request).await
}

pub async fn delete_need(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    delete_catalog_entry(&state, &headers, Catalog::SpecificNeed, id).await
}

// Events #####

/// Open events that have not ended yet
pub async fn list_events(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<EventPublic>>> {
    let today = Utc::now().date_naive();
    let events = state.storage.list_open_events(today).await?;
    Ok(Json(events.iter().map(EventPublic::from_model).collect()))
}

pub async fn get_event(
    Extension(state): Extension<AppState>,
    Path(public_id): Path<Uuid>,
) -> Result<Json<EventPublic>> {
    let event = state
        .storage
        .get_event_by_public_id(public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found.".to_string()))?;
    Ok(Json(EventPublic::from_model(&event)))
}

/// Events the authenticated participant is registered for that have not ended
pub async fn my_events(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventPublic>>> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;
    let participant_id = require_id(participant.id)?;

    let today = Utc::now().date_naive();
    let events = state
        .storage
        .list_events_for_participant(participant_id, Some(today))
        .await?;
    Ok(Json(events.iter().map(EventPublic::from_model).collect()))
}

/// Every event the authenticated participant ever registered for
pub async fn my_registrations(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventPublic>>> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;
    let participant_id = require_id(participant.id)?;

    let events = state
        .storage
        .list_events_for_participant(participant_id, None)
        .await?;
    Ok(Json(events.iter().map(EventPublic::from_model).collect()))
}

pub async fn registration_status(
    Extension(state): Extension<AppState>,
    Path(public_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<RegistrationStatus>> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;
    let participant_id = require_id(participant.id)?;

    let event = state
        .storage
        .get_event_by_public_id(public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found.".to_string()))?;
    let event_id = require_id(event.id)?;

    let registered = state
        .storage
        .registration_exists(participant_id, event_id)
        .await?;
    Ok(Json(RegistrationStatus {
        event_id: public_id,
        event_name: event.name,
        registered,
    }))
}

/// Admin-only event creation
pub async fn create_event(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventPublic>)> {
    authenticate(&state, &headers).await?.require_administrator()?;

    let mut event = Event::new(request.into_args());
    state.storage.create_event(&mut event).await?;
    Ok((StatusCode::CREATED, Json(EventPublic::from_model(&event))))
}

/// Associate the authenticated participant with an event
pub async fn join_event(
    Extension(state): Extension<AppState>,
    Path(public_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Detail>> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;
    let participant_id = require_id(participant.id)?;

    let event = state
        .storage
        .get_event_by_public_id(public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found.".to_string()))?;
    let event_id = require_id(event.id)?;

    state
        .storage
        .create_registration(&Registration::new(participant_id, event_id))
        .await?;

    metrics::event_registration_created();
    Ok(Json(Detail::new("Participant registered for the event successfully.")))
}

// Participants #####

/// Main sign-up route: registers a participant against an existing event
/// and issues their first access token
pub async fn register_participant(
    Extension(state): Extension<AppState>,
    Path(event_public_id): Path<Uuid>,
    Json(request): Json<RegisterParticipantRequest>,
) -> Result<(StatusCode, Json<RegisteredParticipant>)> {
    if state
        .storage
        .get_event_by_public_id(event_public_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Event not found.".to_string()));
    }

    let service = RegistrationService::new(state.storage.clone());
    let participant = service
        .create_participant(request.into_new_participant()?)
        .await?;

    let access_token = security::create_access_token(
        &state.settings,
        &participant.public_id.to_string(),
        false,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredParticipant {
            participant: ParticipantPrivate::from_model(&participant),
            access_token,
            token_type: "bearer".to_string(),
        }),
    ))
}

pub async fn me(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<ParticipantPublic>> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;
    Ok(Json(ParticipantPublic::from_model(&participant)))
}

pub async fn update_me(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateParticipantRequest>,
) -> Result<Json<ParticipantPublic>> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;

    let service = RegistrationService::new(state.storage.clone());
    let updated = service
        .update_participant(&participant, request.into_update()?)
        .await?;
    Ok(Json(ParticipantPublic::from_model(&updated)))
}

pub async fn delete_me(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let participant = authenticate(&state, &headers).await?.require_participant()?;
    let participant_id = require_id(participant.id)?;

    state.storage.delete_participant(participant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Participants (admin) #####

pub async fn admin_list_participants(
    Extension(state): Extension<AppState>,
    Query(page_query): Query<PageQuery>,
    headers: HeaderMap,
) -> Result<Json<ParticipantPage>> {
    authenticate(&state, &headers).await?.require_administrator()?;

    let size = page_query.size.max(1);
    let page = page_query.page.max(1);

    let participants = state.storage.list_participants().await?;
    let total = participants.len();
    let page_items: Vec<ParticipantPrivate> = participants
        .iter()
        .skip((page - 1) * size)
        .take(size)
        .map(ParticipantPrivate::from_model)
        .collect();

    if page_items.is_empty() {
        return Err(AppError::NotFound("No participants found.".to_string()));
    }

    Ok(Json(ParticipantPage {
        total,
        page,
        size,
        participants: page_items,
    }))
}

pub async fn admin_get_participant(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<ParticipantPrivate>> {
    authenticate(&state, &headers).await?.require_administrator()?;

    let participant = state
        .storage
        .get_participant_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Participant not found.".to_string()))?;
    Ok(Json(ParticipantPrivate::from_model(&participant)))
}

/// Admin-side participant creation; no token is issued
pub async fn admin_create_participant(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<RegisterParticipantRequest>,
) -> Result<(StatusCode, Json<ParticipantPrivate>)> {
    authenticate(&state, &headers).await?.require_administrator()?;

    let service = RegistrationService::new(state.storage.clone());
    let participant = service
        .create_participant(request.into_new_participant()?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ParticipantPrivate::from_model(&participant)),
    ))
}

pub async fn admin_delete_participant(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    authenticate(&state, &headers).await?.require_administrator()?;
    state.storage.delete_participant(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Administrators #####

pub async fn admin_me(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdministratorPublic>> {
    let administrator = authenticate(&state, &headers).await?.require_administrator()?;
    Ok(Json(AdministratorPublic::from_model(&administrator)))
}

pub async fn list_administrators(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AdministratorPublic>>> {
    authenticate(&state, &headers).await?.require_administrator()?;

    let administrators = state.storage.list_administrators().await?;
    Ok(Json(
        administrators
            .iter()
            .map(AdministratorPublic::from_model)
            .collect(),
    ))
}

pub async fn create_administrator(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateAdministratorRequest>,
) -> Result<(StatusCode, Json<AdministratorPublic>)> {
    authenticate(&state, &headers).await?.require_administrator()?;

    let name = validate_name("Name", &request.name)?;
    let email = validate_email(&request.email)?;
    validate_password(&request.password)?;

    // The email namespaces of administrators and participants are disjoint
    if state
        .storage
        .get_participant_by_email(&email)
        .await?
        .is_some()
    {
        return Err(AppError::Validation("Email already registered.".to_string()));
    }

    let administrator =
        Administrator::new(name, email, security::hash_password(&request.password));
    state.storage.create_administrator(&administrator).await?;
    Ok((
        StatusCode::CREATED,
        Json(AdministratorPublic::from_model(&administrator)),
    ))
}

fn require_id(id: Option<i64>) -> Result<i64> {
    id.ok_or_else(|| AppError::Database {
        message: "Record is missing its id".to_string(),
    })
}
