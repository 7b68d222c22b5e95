use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::game::CheckVerseGameRequest;
use crate::models::{
    AssetKind, FeedbackCategory, NotificationPreferences, Platform, PrayerKind, ReactionKind, Role, User, UserStatus,
};
use crate::validate::{self, Validate, ValidationResult};

pub const MAX_PAGE_SIZE: u32 = 200;
pub const MAX_TAGS: usize = 10;
pub const MAX_PARTY_SIZE: u32 = 20;

fn default_limit() -> u32 {
    50
}

fn default_true() -> bool {
    true
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> ValidationResult {
        validate::email(&self.email)?;
        validate::text("Name", &self.name, 1, 80)?;
        validate::text("Password", &self.password, 8, 128)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Email", &self.email, 1, 254)?;
        validate::text("Password", &self.password, 1, 128)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Name", self.name.as_deref(), 1, 80)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Current password", &self.current_password, 1, 128)?;
        validate::text("New password", &self.new_password, 8, 128)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminUpdateUserRequest {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

impl Validate for AdminUpdateUserRequest {
    fn validate(&self) -> ValidationResult {
        if self.role.is_none() && self.status.is_none() {
            return Err("Nothing to update".to_string());
        }
        Ok(())
    }
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    #[serde(default)]
    pub is_potluck: bool,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl Validate for CreateEventRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Title", &self.title, 1, 200)?;
        validate::text("Description", &self.description, 0, 5000)?;
        validate::optional_text("Location", self.location.as_deref(), 0, 300)?;
        if let Some(ends_at) = self.ends_at {
            if ends_at <= self.starts_at {
                return Err("End time must be after start time".to_string());
            }
        }
        if let Some(capacity) = self.capacity {
            validate::range("Capacity", capacity, 1, 10_000)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub capacity: Option<Option<u32>>,
    pub is_potluck: Option<bool>,
    pub is_published: Option<bool>,
}

impl Validate for UpdateEventRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Title", self.title.as_deref(), 1, 200)?;
        validate::optional_text("Description", self.description.as_deref(), 0, 5000)?;
        if let Some(Some(location)) = &self.location {
            validate::text("Location", location, 0, 300)?;
        }
        if let Some(Some(capacity)) = self.capacity {
            validate::range("Capacity", capacity, 1, 10_000)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    #[serde(default)]
    pub include_past: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsvpRequest {
    pub adults: u32,
    #[serde(default)]
    pub kids: u32,
    pub dish: Option<String>,
}

impl Validate for RsvpRequest {
    fn validate(&self) -> ValidationResult {
        validate::range("Adults", self.adults, 0, MAX_PARTY_SIZE)?;
        validate::range("Kids", self.kids, 0, MAX_PARTY_SIZE)?;
        if self.adults + self.kids == 0 {
            return Err("At least one attendee is required".to_string());
        }
        validate::optional_text("Dish", self.dish.as_deref(), 1, 200)
    }
}

// -- Prayers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePrayerRequest {
    #[serde(default = "default_prayer_kind")]
    pub kind: PrayerKind,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

fn default_prayer_kind() -> PrayerKind {
    PrayerKind::Request
}

impl Validate for CreatePrayerRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Content", &self.content, 1, 2000)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePrayerRequest {
    pub kind: Option<PrayerKind>,
    pub content: Option<String>,
    pub is_anonymous: Option<bool>,
    pub is_answered: Option<bool>,
}

impl Validate for UpdatePrayerRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Content", self.content.as_deref(), 1, 2000)
    }
}

#[derive(Debug, Deserialize)]
pub struct PrayerQuery {
    pub kind: Option<PrayerKind>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor: `created_at` and `id` of the oldest prayer on the previous page.
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub kind: ReactionKind,
}

impl Validate for ReactionRequest {
    fn validate(&self) -> ValidationResult {
        Ok(())
    }
}

/// Target's counters after a reaction change, plus the caller's reactions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub reaction_count: u32,
    pub my_reactions: Vec<ReactionKind>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: String,
}

impl Validate for CommentRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Comment", &self.content, 1, 1000)
    }
}

// -- Reflections --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReflectionRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Validate for CreateReflectionRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Title", &self.title, 1, 200)?;
        validate::text("Content", &self.content, 1, 20_000)?;
        validate_tags(&self.tags)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateReflectionRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl Validate for UpdateReflectionRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Title", self.title.as_deref(), 1, 200)?;
        validate::optional_text("Content", self.content.as_deref(), 1, 20_000)?;
        match &self.tags {
            Some(tags) => validate_tags(tags),
            None => Ok(()),
        }
    }
}

fn validate_tags(tags: &[String]) -> ValidationResult {
    let tags = normalize_tags(tags);
    if tags.len() > MAX_TAGS {
        return Err(format!("At most {} tags are allowed", MAX_TAGS));
    }
    for tag in &tags {
        validate::text("Tag", tag, 1, 32)?;
    }
    Ok(())
}

/// Lowercases, trims, drops blanks and duplicates while keeping first-seen
/// order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[derive(Debug, Deserialize)]
pub struct ReflectionQuery {
    pub tag: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<Uuid>,
}

// -- Recipes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub servings: Option<u32>,
    pub prep_minutes: Option<u32>,
    pub cook_minutes: Option<u32>,
    pub image_url: Option<String>,
}

impl Validate for CreateRecipeRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Title", &self.title, 1, 200)?;
        validate::text("Description", &self.description, 0, 2000)?;
        validate_ingredients(&self.ingredients)?;
        validate::text("Instructions", &self.instructions, 1, 20_000)?;
        validate_recipe_numbers(self.servings, self.prep_minutes, self.cook_minutes)?;
        match &self.image_url {
            Some(url) => validate::http_url("Image URL", url),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub servings: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub prep_minutes: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub cook_minutes: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
}

impl Validate for UpdateRecipeRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Title", self.title.as_deref(), 1, 200)?;
        validate::optional_text("Description", self.description.as_deref(), 0, 2000)?;
        if let Some(ingredients) = &self.ingredients {
            validate_ingredients(ingredients)?;
        }
        validate::optional_text("Instructions", self.instructions.as_deref(), 1, 20_000)?;
        validate_recipe_numbers(
            self.servings.flatten(),
            self.prep_minutes.flatten(),
            self.cook_minutes.flatten(),
        )?;
        if let Some(Some(url)) = &self.image_url {
            validate::http_url("Image URL", url)?;
        }
        Ok(())
    }
}

fn validate_ingredients(ingredients: &[String]) -> ValidationResult {
    if ingredients.is_empty() {
        return Err("At least one ingredient is required".to_string());
    }
    if ingredients.len() > 100 {
        return Err("At most 100 ingredients are allowed".to_string());
    }
    for line in ingredients {
        validate::text("Ingredient", line, 1, 200)?;
    }
    Ok(())
}

fn validate_recipe_numbers(servings: Option<u32>, prep: Option<u32>, cook: Option<u32>) -> ValidationResult {
    if let Some(servings) = servings {
        validate::range("Servings", servings, 1, 500)?;
    }
    if let Some(prep) = prep {
        validate::range("Prep minutes", prep, 0, 1440)?;
    }
    if let Some(cook) = cook {
        validate::range("Cook minutes", cook, 0, 1440)?;
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateRecipeRequest {
    pub score: u8,
}

impl Validate for RateRecipeRequest {
    fn validate(&self) -> ValidationResult {
        validate::range("Score", self.score, 1, 5)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RatingResponse {
    pub rating_average: f64,
    pub rating_count: u32,
    pub my_rating: Option<u8>,
}

// -- Kids corner --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateKidsAssetRequest {
    pub kind: AssetKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub content: Option<String>,
    pub reference: Option<String>,
}

impl Validate for CreateKidsAssetRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Title", &self.title, 1, 200)?;
        validate::text("Description", &self.description, 0, 2000)?;
        validate::optional_text("Content", self.content.as_deref(), 1, 10_000)?;
        validate::optional_text("Reference", self.reference.as_deref(), 1, 100)?;
        if self.kind == AssetKind::Verse {
            if self.reference.is_none() {
                return Err("Reference is required for verses".to_string());
            }
            if self.content.is_none() {
                return Err("Content is required for verses".to_string());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateKidsAssetRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub reference: Option<Option<String>>,
}

impl Validate for UpdateKidsAssetRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Title", self.title.as_deref(), 1, 200)?;
        validate::optional_text("Description", self.description.as_deref(), 0, 2000)?;
        if let Some(Some(content)) = &self.content {
            validate::text("Content", content, 1, 10_000)?;
        }
        if let Some(Some(reference)) = &self.reference {
            validate::text("Reference", reference, 1, 100)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KidsAssetQuery {
    pub kind: Option<AssetKind>,
}

#[derive(Debug, Deserialize)]
pub struct VerseGameQuery {
    #[serde(default = "default_pairs")]
    pub pairs: usize,
}

fn default_pairs() -> usize {
    crate::game::DEFAULT_PAIRS
}

impl Validate for VerseGameQuery {
    fn validate(&self) -> ValidationResult {
        validate::range("Pairs", self.pairs, crate::game::MIN_PAIRS, crate::game::MAX_PAIRS)
    }
}

impl Validate for CheckVerseGameRequest {
    fn validate(&self) -> ValidationResult {
        if self.matches.len() > 4 * crate::game::MAX_PAIRS {
            return Err("Too many matches".to_string());
        }
        Ok(())
    }
}

// -- Playlists --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePlaylistRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
}

impl Validate for CreatePlaylistRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Title", &self.title, 1, 200)?;
        validate::text("Description", &self.description, 0, 2000)?;
        validate::http_url("URL", &self.url)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePlaylistRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

impl Validate for UpdatePlaylistRequest {
    fn validate(&self) -> ValidationResult {
        validate::optional_text("Title", self.title.as_deref(), 1, 200)?;
        validate::optional_text("Description", self.description.as_deref(), 0, 2000)?;
        match &self.url {
            Some(url) => validate::http_url("URL", url),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReorderPlaylistsRequest {
    pub ids: Vec<Uuid>,
}

impl Validate for ReorderPlaylistsRequest {
    fn validate(&self) -> ValidationResult {
        let mut seen = std::collections::HashSet::new();
        if !self.ids.iter().all(|id| seen.insert(*id)) {
            return Err("Playlist ids must be unique".to_string());
        }
        Ok(())
    }
}

// -- Notifications --

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Validate for NotificationPreferences {
    fn validate(&self) -> ValidationResult {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterDeviceRequest {
    pub token: String,
    pub platform: Platform,
}

impl Validate for RegisterDeviceRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Token", &self.token, 1, 512)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnouncementRequest {
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

impl Validate for AnnouncementRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Title", &self.title, 1, 200)?;
        validate::text("Body", &self.body, 1, 2000)?;
        validate::optional_text("Link", self.link.as_deref(), 1, 2048)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementResponse {
    pub recipients: usize,
}

// -- Feedback / settings --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFeedbackRequest {
    #[serde(default = "default_feedback_category")]
    pub category: FeedbackCategory,
    pub message: String,
}

fn default_feedback_category() -> FeedbackCategory {
    FeedbackCategory::Other
}

impl Validate for CreateFeedbackRequest {
    fn validate(&self) -> ValidationResult {
        validate::text("Message", &self.message, 1, 2000)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingsRequest {
    pub prayer_moderation: Option<bool>,
}

impl Validate for UpdateSettingsRequest {
    fn validate(&self) -> ValidationResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_bodies_distinguish_null_from_absent() {
        let absent: UpdateEventRequest = serde_json::from_str("{}").unwrap();
        assert!(absent.capacity.is_none());

        let cleared: UpdateEventRequest = serde_json::from_str(r#"{"capacity":null}"#).unwrap();
        assert_eq!(cleared.capacity, Some(None));

        let set: UpdateEventRequest = serde_json::from_str(r#"{"capacity":12}"#).unwrap();
        assert_eq!(set.capacity, Some(Some(12)));
    }

    #[test]
    fn rsvp_needs_at_least_one_attendee() {
        let empty = RsvpRequest { adults: 0, kids: 0, dish: None };
        assert_eq!(empty.validate().unwrap_err(), "At least one attendee is required");

        let kids_only = RsvpRequest { adults: 0, kids: 2, dish: None };
        assert!(kids_only.validate().is_ok());
    }

    #[test]
    fn event_end_must_follow_start() {
        let starts_at = Utc::now();
        let req = CreateEventRequest {
            title: "Picnic".into(),
            description: String::new(),
            location: None,
            starts_at,
            ends_at: Some(starts_at - chrono::Duration::hours(1)),
            capacity: None,
            is_potluck: true,
            is_published: true,
        };
        assert_eq!(req.validate().unwrap_err(), "End time must be after start time");
    }

    #[test]
    fn tags_are_normalized_before_counting() {
        let tags = vec!["Grace".to_string(), " grace ".to_string(), "".to_string(), "Hope".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["grace", "hope"]);

        let many: Vec<String> = (0..11).map(|i| format!("tag{}", i)).collect();
        assert!(validate_tags(&many).is_err());
    }

    #[test]
    fn verses_need_reference_and_text() {
        let req = CreateKidsAssetRequest {
            kind: AssetKind::Verse,
            title: "Love".into(),
            description: String::new(),
            content: Some("For God so loved the world".into()),
            reference: None,
        };
        assert_eq!(req.validate().unwrap_err(), "Reference is required for verses");
    }

    #[test]
    fn reorder_rejects_duplicate_ids() {
        let id = Uuid::new_v4();
        let req = ReorderPlaylistsRequest { ids: vec![id, id] };
        assert!(req.validate().is_err());
    }
}
