//! Database row types. These map directly to SQLite rows and stay distinct
//! from the fellowship-types API models so the DB layer is independent of
//! response shapes (anonymity masking, public URLs, per-viewer fields).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fellowship_types::models::{
    AssetKind, FeedbackCategory, NotificationKind, Platform, PrayerKind, Role, TargetType, UserStatus,
};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    pub status: UserStatus,
    pub profile_image_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct NewUser<'a> {
    pub id: Uuid,
    pub email: &'a str,
    pub name: &'a str,
    pub password_hash: &'a str,
}

// -- Events --

#[derive(Debug, Clone)]
pub struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub is_potluck: bool,
    pub is_published: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub rsvp_count: u32,
    pub attendee_count: u32,
}

/// Editable event columns, used for both insert and full-row update.
#[derive(Debug, Clone)]
pub struct EventFields {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub is_potluck: bool,
    pub is_published: bool,
}

impl From<&EventRow> for EventFields {
    fn from(row: &EventRow) -> Self {
        Self {
            title: row.title.clone(),
            description: row.description.clone(),
            location: row.location.clone(),
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            capacity: row.capacity,
            is_potluck: row.is_potluck,
            is_published: row.is_published,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RsvpRow {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub adults: u32,
    pub kids: u32,
    pub dish: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum RsvpOutcome {
    Saved(RsvpRow),
    /// Seats still free for this user once their previous RSVP is released.
    OverCapacity { remaining: u32 },
    EventMissing,
}

// -- Prayers / reflections --

#[derive(Debug, Clone)]
pub struct PrayerRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub kind: PrayerKind,
    pub content: String,
    pub is_anonymous: bool,
    pub is_answered: bool,
    pub is_approved: bool,
    pub reaction_count: u32,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

pub struct NewPrayer<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PrayerKind,
    pub content: &'a str,
    pub is_anonymous: bool,
    pub is_approved: bool,
}

pub struct PrayerFilter {
    pub viewer: Uuid,
    pub kind: Option<PrayerKind>,
    pub before: Option<DateTime<Utc>>,
    /// Breaks ties between rows sharing the `before` timestamp.
    pub before_id: Option<Uuid>,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct ReflectionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub reaction_count: u32,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ReflectionFilter<'a> {
    pub tag: Option<&'a str>,
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
    pub limit: u32,
}

// -- Reactions / comments --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    Added,
    Duplicate,
    TargetMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionRemoval {
    /// Carries the target's counter after the decrement.
    Removed { reaction_count: u32 },
    NotReacted,
    TargetMissing,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Recipes --

#[derive(Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub author_name: String,
    pub fields: RecipeFields,
    pub rating_average: f64,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecipeFields {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub servings: Option<u32>,
    pub prep_minutes: Option<u32>,
    pub cook_minutes: Option<u32>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

// -- Kids corner --

#[derive(Debug, Clone)]
pub struct KidsAssetRow {
    pub id: Uuid,
    pub kind: AssetKind,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub reference: Option<String>,
    pub file_key: Option<String>,
    pub download_count: u32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct KidsAssetFields {
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub reference: Option<String>,
}

// -- Playlists --

#[derive(Debug, Clone)]
pub struct PlaylistRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub url: String,
    pub sort_index: i64,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub email_sent: bool,
    pub push_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeviceTokenRow {
    pub token: String,
    pub user_id: Uuid,
    pub platform: Platform,
    pub created_at: DateTime<Utc>,
}

// -- Feedback --

#[derive(Debug, Clone)]
pub struct FeedbackRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub category: FeedbackCategory,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
