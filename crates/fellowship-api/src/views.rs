//! Row to response conversions. Anything that depends on who is asking
//! (anonymity, the caller's own RSVP/reactions/rating) or on configuration
//! (public file URLs) is resolved here.

use fellowship_db::models::{
    CommentRow, DeviceTokenRow, EventRow, FeedbackRow, KidsAssetRow, NotificationRow, PlaylistRow, PrayerRow,
    RecipeRow, ReflectionRow, RsvpRow, UserRow,
};
use fellowship_types::models::{
    Comment, DeviceToken, Event, Feedback, KidsAsset, Notification, Playlist, Prayer, ReactionKind, Recipe,
    Reflection, Rsvp, User,
};

use crate::middleware::CurrentUser;
use crate::storage::Storage;

pub fn user(storage: &Storage, row: UserRow) -> User {
    User {
        avatar_url: row.profile_image_key.as_deref().map(|key| storage.public_url(key)),
        id: row.id,
        email: row.email,
        name: row.name,
        role: row.role,
        status: row.status,
        created_at: row.created_at,
    }
}

pub fn rsvp(row: RsvpRow) -> Rsvp {
    Rsvp {
        event_id: row.event_id,
        user_id: row.user_id,
        user_name: row.user_name,
        adults: row.adults,
        kids: row.kids,
        dish: row.dish,
        updated_at: row.updated_at,
    }
}

pub fn event(row: EventRow, my_rsvp: Option<RsvpRow>) -> Event {
    Event {
        spots_remaining: row.capacity.map(|c| c.saturating_sub(row.attendee_count)),
        my_rsvp: my_rsvp.map(rsvp),
        id: row.id,
        title: row.title,
        description: row.description,
        location: row.location,
        starts_at: row.starts_at,
        ends_at: row.ends_at,
        capacity: row.capacity,
        is_potluck: row.is_potluck,
        is_published: row.is_published,
        created_by: row.created_by,
        created_at: row.created_at,
        rsvp_count: row.rsvp_count,
        attendee_count: row.attendee_count,
    }
}

/// Anonymous prayers only reveal their author to the author and admins.
pub fn prayer(row: PrayerRow, viewer: &CurrentUser, my_reactions: Vec<ReactionKind>) -> Prayer {
    let reveal = !row.is_anonymous || viewer.can_modify(row.user_id);
    Prayer {
        author_id: reveal.then_some(row.user_id),
        author_name: reveal.then_some(row.author_name),
        id: row.id,
        kind: row.kind,
        content: row.content,
        is_anonymous: row.is_anonymous,
        is_answered: row.is_answered,
        is_approved: row.is_approved,
        reaction_count: row.reaction_count,
        comment_count: row.comment_count,
        my_reactions,
        created_at: row.created_at,
    }
}

pub fn reflection(row: ReflectionRow, my_reactions: Vec<ReactionKind>) -> Reflection {
    Reflection {
        id: row.id,
        title: row.title,
        content: row.content,
        tags: row.tags,
        author_id: row.user_id,
        author_name: row.author_name,
        reaction_count: row.reaction_count,
        comment_count: row.comment_count,
        my_reactions,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn comment(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        target_type: row.target_type,
        target_id: row.target_id,
        author_id: row.user_id,
        author_name: row.author_name,
        content: row.content,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn recipe(row: RecipeRow, my_rating: Option<u8>) -> Recipe {
    let fields = row.fields;
    Recipe {
        id: row.id,
        title: fields.title,
        description: fields.description,
        ingredients: fields.ingredients,
        instructions: fields.instructions,
        servings: fields.servings,
        prep_minutes: fields.prep_minutes,
        cook_minutes: fields.cook_minutes,
        image_url: fields.image_url,
        author_id: row.user_id,
        author_name: row.author_name,
        rating_average: row.rating_average,
        rating_count: row.rating_count,
        my_rating,
        created_at: row.created_at,
    }
}

pub fn kids_asset(storage: &Storage, row: KidsAssetRow) -> KidsAsset {
    KidsAsset {
        file_url: row.file_key.as_deref().map(|key| storage.public_url(key)),
        id: row.id,
        kind: row.kind,
        title: row.title,
        description: row.description,
        content: row.content,
        reference: row.reference,
        download_count: row.download_count,
        created_at: row.created_at,
    }
}

pub fn playlist(row: PlaylistRow) -> Playlist {
    Playlist {
        id: row.id,
        title: row.title,
        description: row.description,
        url: row.url,
        sort_index: row.sort_index,
        created_at: row.created_at,
    }
}

pub fn notification(row: NotificationRow) -> Notification {
    Notification {
        id: row.id,
        kind: row.kind,
        title: row.title,
        body: row.body,
        link: row.link,
        is_read: row.is_read,
        email_sent: row.email_sent,
        push_sent: row.push_sent,
        created_at: row.created_at,
    }
}

pub fn device_token(row: DeviceTokenRow) -> DeviceToken {
    DeviceToken {
        token: row.token,
        platform: row.platform,
        created_at: row.created_at,
    }
}

pub fn feedback(row: FeedbackRow) -> Feedback {
    Feedback {
        id: row.id,
        user_id: row.user_id,
        user_name: row.user_name,
        category: row.category,
        message: row.message,
        is_read: row.is_read,
        created_at: row.created_at,
    }
}
