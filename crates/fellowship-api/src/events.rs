use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use fellowship_db::models::{EventFields, EventRow, NewNotification, RsvpOutcome};
use fellowship_types::api::{CreateEventRequest, EventListQuery, RsvpRequest, UpdateEventRequest};
use fellowship_types::models::{Event, EventDetail, NotificationKind, Rsvp};

use crate::error::{ApiError, ApiResult};
use crate::extract::{QueryParams, ValidJson};
use crate::middleware::CurrentUser;
use crate::notify;
use crate::state::{AppState, blocking};
use crate::views;

/// Loads an event the caller is allowed to see. Drafts are admin-only.
async fn visible_event(state: &AppState, me: &CurrentUser, id: Uuid) -> ApiResult<EventRow> {
    let event = blocking(state, move |db| db.get_event(id)).await?;
    match event {
        Some(event) if event.is_published || me.is_admin() => Ok(event),
        _ => Err(ApiError::NotFound("Event not found")),
    }
}

fn announce(state: &AppState, me: &CurrentUser, event: &EventRow) {
    let when = event.starts_at.format("%A, %B %-d at %-I:%M %p UTC");
    let body = match &event.location {
        Some(location) => format!("{} at {}", when, location),
        None => when.to_string(),
    };
    notify::notify_members(
        state,
        Some(me.id),
        NewNotification {
            kind: NotificationKind::Event,
            title: format!("New event: {}", event.title),
            body,
            link: Some(format!("/events/{}", event.id)),
        },
    );
}

/// GET /api/events
pub async fn list_events(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    QueryParams(query): QueryParams<EventListQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    let from = (!query.include_past).then(Utc::now);
    let include_drafts = me.is_admin();
    let user_id = me.id;

    let (events, mine) = blocking(&state, move |db| {
        let events = db.list_events(from, include_drafts)?;
        let ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let mine = db.rsvps_for_user(user_id, &ids)?;
        Ok((events, mine))
    })
    .await?;

    let mut mine: HashMap<Uuid, _> = mine.into_iter().map(|r| (r.event_id, r)).collect();
    let events = events
        .into_iter()
        .map(|e| {
            let rsvp = mine.remove(&e.id);
            views::event(e, rsvp)
        })
        .collect();
    Ok(Json(events))
}

/// GET /api/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EventDetail>> {
    let event = visible_event(&state, &me, id).await?;
    let rsvps = blocking(&state, move |db| db.list_rsvps(id)).await?;

    let mine = rsvps.iter().find(|r| r.user_id == me.id).cloned();
    Ok(Json(EventDetail {
        event: views::event(event, mine),
        rsvps: rsvps.into_iter().map(views::rsvp).collect(),
    }))
}

/// POST /api/events (admin)
pub async fn create_event(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    ValidJson(req): ValidJson<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    me.require_admin()?;

    let fields = EventFields {
        title: req.title.trim().to_string(),
        description: req.description.trim().to_string(),
        location: req.location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()),
        starts_at: req.starts_at,
        ends_at: req.ends_at,
        capacity: req.capacity,
        is_potluck: req.is_potluck,
        is_published: req.is_published,
    };
    let created_by = me.id;
    let event = blocking(&state, move |db| db.insert_event(Uuid::new_v4(), created_by, &fields)).await?;

    if event.is_published {
        announce(&state, &me, &event);
    }
    Ok((StatusCode::CREATED, Json(views::event(event, None))))
}

/// PATCH /api/events/{id} (owner or admin)
pub async fn update_event(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateEventRequest>,
) -> ApiResult<Json<Event>> {
    let existing = visible_event(&state, &me, id).await?;
    if !me.can_modify(existing.created_by) {
        return Err(ApiError::Forbidden("You can only edit your own events"));
    }

    let mut fields = EventFields::from(&existing);
    if let Some(title) = req.title {
        fields.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        fields.description = description.trim().to_string();
    }
    if let Some(location) = req.location {
        fields.location = location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
    }
    if let Some(starts_at) = req.starts_at {
        fields.starts_at = starts_at;
    }
    if let Some(ends_at) = req.ends_at {
        fields.ends_at = ends_at;
    }
    if let Some(capacity) = req.capacity {
        fields.capacity = capacity;
    }
    if let Some(is_potluck) = req.is_potluck {
        fields.is_potluck = is_potluck;
    }
    if let Some(is_published) = req.is_published {
        fields.is_published = is_published;
    }

    if let Some(ends_at) = fields.ends_at {
        if ends_at <= fields.starts_at {
            return Err(ApiError::bad_request("End time must be after start time"));
        }
    }
    if let Some(capacity) = fields.capacity {
        if capacity < existing.attendee_count {
            return Err(ApiError::bad_request(format!(
                "Capacity cannot be lower than the {} people already attending",
                existing.attendee_count
            )));
        }
    }

    let event = blocking(&state, move |db| db.update_event(id, &fields))
        .await?
        .ok_or(ApiError::NotFound("Event not found"))?;

    if !existing.is_published && event.is_published {
        announce(&state, &me, &event);
    }

    let user_id = me.id;
    let mine = blocking(&state, move |db| db.get_rsvp(id, user_id)).await?;
    Ok(Json(views::event(event, mine)))
}

/// DELETE /api/events/{id} (owner or admin)
pub async fn delete_event(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = visible_event(&state, &me, id).await?;
    if !me.can_modify(existing.created_by) {
        return Err(ApiError::Forbidden("You can only delete your own events"));
    }
    if !blocking(&state, move |db| db.delete_event(id)).await? {
        return Err(ApiError::NotFound("Event not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/events/{id}/rsvp
pub async fn upsert_rsvp(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<RsvpRequest>,
) -> ApiResult<Json<Rsvp>> {
    let event = visible_event(&state, &me, id).await?;
    if !event.is_published {
        return Err(ApiError::bad_request("This event is not open for RSVPs yet"));
    }
    if event.starts_at <= Utc::now() {
        return Err(ApiError::bad_request("This event has already started"));
    }

    let dish = req.dish.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    if dish.is_some() && !event.is_potluck {
        return Err(ApiError::bad_request("Dishes can only be added to potluck events"));
    }

    let user_id = me.id;
    let outcome = blocking(&state, move |db| db.upsert_rsvp(id, user_id, req.adults, req.kids, dish.as_deref())).await?;
    match outcome {
        RsvpOutcome::Saved(row) => Ok(Json(views::rsvp(row))),
        RsvpOutcome::OverCapacity { .. } => Err(ApiError::bad_request("Not enough spots remaining")),
        RsvpOutcome::EventMissing => Err(ApiError::NotFound("Event not found")),
    }
}

/// DELETE /api/events/{id}/rsvp
pub async fn delete_rsvp(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user_id = me.id;
    if !blocking(&state, move |db| db.delete_rsvp(id, user_id)).await? {
        return Err(ApiError::NotFound("RSVP not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
