use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a fieldless enum that is stored as TEXT and travels as a
/// snake_case JSON string.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

text_enum!(Role {
    Member => "member",
    Admin => "admin",
});

text_enum!(UserStatus {
    Active => "active",
    Suspended => "suspended",
});

text_enum!(PrayerKind {
    Request => "request",
    Praise => "praise",
});

text_enum!(
    /// What a reaction says about its target.
    ReactionKind {
        Prayed => "prayed",
        Like => "like",
    }
);

text_enum!(
    /// Content that can carry reactions and comments.
    TargetType {
        Prayer => "prayer",
        Reflection => "reflection",
    }
);

text_enum!(AssetKind {
    Verse => "verse",
    Activity => "activity",
    Coloring => "coloring",
});

text_enum!(NotificationKind {
    Event => "event",
    Prayer => "prayer",
    Comment => "comment",
    Reaction => "reaction",
    Announcement => "announcement",
});

text_enum!(Platform {
    Ios => "ios",
    Android => "android",
    Web => "web",
});

text_enum!(FeedbackCategory {
    Bug => "bug",
    Idea => "idea",
    Other => "other",
});

/// Preference bucket a notification kind falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Events,
    Prayers,
    Activity,
    Announcements,
}

impl NotificationKind {
    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::Event => NotificationCategory::Events,
            Self::Prayer => NotificationCategory::Prayers,
            Self::Comment | Self::Reaction => NotificationCategory::Activity,
            Self::Announcement => NotificationCategory::Announcements,
        }
    }
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub status: UserStatus,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Events --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
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
    pub spots_remaining: Option<u32>,
    pub my_rsvp: Option<Rsvp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rsvp {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub adults: u32,
    pub kids: u32,
    pub dish: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub rsvps: Vec<Rsvp>,
}

// -- Prayer wall --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prayer {
    pub id: Uuid,
    pub kind: PrayerKind,
    pub content: String,
    pub is_anonymous: bool,
    pub is_answered: bool,
    pub is_approved: bool,
    /// `None` when the prayer is anonymous and the viewer is neither the
    /// author nor an admin.
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub reaction_count: u32,
    pub comment_count: u32,
    pub my_reactions: Vec<ReactionKind>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author_id: Uuid,
    pub author_name: String,
    pub reaction_count: u32,
    pub comment_count: u32,
    pub my_reactions: Vec<ReactionKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Recipes --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: String,
    pub servings: Option<u32>,
    pub prep_minutes: Option<u32>,
    pub cook_minutes: Option<u32>,
    pub image_url: Option<String>,
    pub author_id: Uuid,
    pub author_name: String,
    pub rating_average: f64,
    pub rating_count: u32,
    pub my_rating: Option<u8>,
    pub created_at: DateTime<Utc>,
}

// -- Kids corner --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KidsAsset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub title: String,
    pub description: String,
    pub content: Option<String>,
    pub reference: Option<String>,
    pub file_url: Option<String>,
    pub download_count: u32,
    pub created_at: DateTime<Utc>,
}

// -- Music --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub url: String,
    pub sort_index: i64,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub email_sent: bool,
    pub push_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email_events: bool,
    pub push_events: bool,
    pub email_prayers: bool,
    pub push_prayers: bool,
    pub email_activity: bool,
    pub push_activity: bool,
    pub email_announcements: bool,
    pub push_announcements: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_events: true,
            push_events: true,
            email_prayers: true,
            push_prayers: true,
            email_activity: true,
            push_activity: true,
            email_announcements: true,
            push_announcements: true,
        }
    }
}

impl NotificationPreferences {
    pub fn email_enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Events => self.email_events,
            NotificationCategory::Prayers => self.email_prayers,
            NotificationCategory::Activity => self.email_activity,
            NotificationCategory::Announcements => self.email_announcements,
        }
    }

    pub fn push_enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Events => self.push_events,
            NotificationCategory::Prayers => self.push_prayers,
            NotificationCategory::Activity => self.push_activity,
            NotificationCategory::Announcements => self.push_announcements,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    pub token: String,
    pub platform: Platform,
    pub created_at: DateTime<Utc>,
}

// -- Feedback / settings --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub category: FeedbackCategory,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SiteSettings {
    pub prayer_moderation: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminStats {
    pub users: u64,
    pub active_users: u64,
    pub upcoming_events: u64,
    pub prayers: u64,
    pub pending_prayers: u64,
    pub reflections: u64,
    pub recipes: u64,
    pub kids_assets: u64,
    pub unread_feedback: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_round_trip_through_strings() {
        for kind in AssetKind::ALL {
            assert_eq!(kind.as_str().parse::<AssetKind>().unwrap(), *kind);
        }
        assert!("sticker".parse::<AssetKind>().is_err());
    }

    #[test]
    fn text_enums_serialize_snake_case() {
        let json = serde_json::to_string(&NotificationKind::Announcement).unwrap();
        assert_eq!(json, "\"announcement\"");
        let kind: ReactionKind = serde_json::from_str("\"prayed\"").unwrap();
        assert_eq!(kind, ReactionKind::Prayed);
    }

    #[test]
    fn comments_and_reactions_share_a_category() {
        let prefs = NotificationPreferences {
            push_activity: false,
            ..Default::default()
        };
        assert!(!prefs.push_enabled(NotificationKind::Comment.category()));
        assert!(!prefs.push_enabled(NotificationKind::Reaction.category()));
        assert!(prefs.push_enabled(NotificationKind::Event.category()));
        assert!(prefs.email_enabled(NotificationKind::Reaction.category()));
    }
}
