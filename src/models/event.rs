// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Free-time event model for storage and API.

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Stored event record ("I'm free from `start` to `end`").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event ID (also used as document ID)
    pub id: String,
    /// Owning user ID
    pub owner_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: EventLocation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where the owner is available.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventLocation {
    Online,
    Physical {
        latitude: f64,
        longitude: f64,
        /// Search radius in kilometers (0 = this exact point only)
        radius_km: f64,
    },
}

impl EventLocation {
    /// Coordinates as a `geo::Point` (x = longitude, y = latitude).
    pub fn point(&self) -> Option<Point<f64>> {
        match *self {
            EventLocation::Online => None,
            EventLocation::Physical {
                latitude,
                longitude,
                ..
            } => Some(Point::new(longitude, latitude)),
        }
    }

    pub fn radius_km(&self) -> f64 {
        match *self {
            EventLocation::Online => 0.0,
            EventLocation::Physical { radius_km, .. } => radius_km,
        }
    }
}

/// Reasons an event is excluded from matching.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventIssue {
    #[error("event has an empty id or owner id")]
    MissingId,

    #[error("event id {0:?} is not a valid document id")]
    InvalidId(String),

    #[error("event window is empty (start must be before end)")]
    EmptyWindow,

    #[error("event coordinates are not finite or out of range")]
    InvalidCoordinates,

    #[error("event radius {0} km is outside the allowed range")]
    InvalidRadius(f64),
}

impl Event {
    /// Whether the event is still relevant at `now` (its end has not passed).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.end >= now
    }

    /// Check that the event can be fed into the match pipeline.
    pub fn check(&self, max_radius_km: f64) -> Result<(), EventIssue> {
        if self.id.is_empty() || self.owner_id.is_empty() {
            return Err(EventIssue::MissingId);
        }
        check_event_id(&self.id)?;
        if self.start >= self.end {
            return Err(EventIssue::EmptyWindow);
        }
        if let EventLocation::Physical {
            latitude,
            longitude,
            radius_km,
        } = self.location
        {
            if !latitude.is_finite()
                || !longitude.is_finite()
                || latitude.abs() > MAX_LATITUDE
                || longitude.abs() > 180.0
            {
                return Err(EventIssue::InvalidCoordinates);
            }
            if !radius_km.is_finite() || radius_km < 0.0 || radius_km > max_radius_km {
                return Err(EventIssue::InvalidRadius(radius_km));
            }
        }
        Ok(())
    }
}

/// Longest accepted event ID, in bytes.
pub const MAX_EVENT_ID_LEN: usize = 128;

/// Event IDs are used verbatim as Firestore document IDs: no `/`, not `.`
/// or `..`, and no `__name__` style reserved IDs.
pub fn check_event_id(id: &str) -> Result<(), EventIssue> {
    if id.is_empty() {
        return Err(EventIssue::MissingId);
    }
    let reserved = id == "." || id == ".." || (id.starts_with("__") && id.ends_with("__"));
    if id.len() > MAX_EVENT_ID_LEN || id.contains('/') || reserved {
        return Err(EventIssue::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Latitude limit for physical events; the rough distance estimate degrades
/// near the poles.
pub const MAX_LATITUDE: f64 = 85.0;

/// Request body for creating or editing an event.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventInput {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub online: bool,
    #[validate(range(min = -85.0, max = 85.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(range(min = 0.0))]
    pub radius_km: Option<f64>,
}

impl EventInput {
    /// Build the location, requiring coordinates for physical events.
    pub fn location(&self) -> Result<EventLocation, EventIssue> {
        if self.online {
            return Ok(EventLocation::Online);
        }
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Ok(EventLocation::Physical {
                latitude,
                longitude,
                radius_km: self.radius_km.unwrap_or(0.0),
            }),
            _ => Err(EventIssue::InvalidCoordinates),
        }
    }
}
