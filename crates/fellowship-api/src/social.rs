//! Reactions and comments shared by prayers and reflections.

use uuid::Uuid;

use fellowship_db::models::{NewNotification, ReactionOutcome, ReactionRemoval};
use fellowship_types::api::ReactionResponse;
use fellowship_types::models::{Comment, NotificationKind, ReactionKind, TargetType};

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::notify;
use crate::state::{AppState, blocking};
use crate::views;

fn missing(target: TargetType) -> ApiError {
    match target {
        TargetType::Prayer => ApiError::NotFound("Prayer not found"),
        TargetType::Reflection => ApiError::NotFound("Reflection not found"),
    }
}

fn noun(target: TargetType) -> &'static str {
    match target {
        TargetType::Prayer => "prayer",
        TargetType::Reflection => "reflection",
    }
}

fn link(target: TargetType, id: Uuid) -> String {
    match target {
        TargetType::Prayer => format!("/prayers/{}", id),
        TargetType::Reflection => format!("/reflections/{}", id),
    }
}

/// Owner of a live target the caller may interact with. Unapproved prayers
/// are only reachable by their author and admins.
async fn reachable_owner(state: &AppState, me: &CurrentUser, target: TargetType, id: Uuid) -> ApiResult<Uuid> {
    let found = blocking(state, move |db| {
        let owner = db.target_owner(target, id)?;
        let approved = match (target, owner) {
            (TargetType::Prayer, Some(_)) => db.get_prayer(id)?.is_some_and(|p| p.is_approved),
            _ => true,
        };
        Ok(owner.map(|owner| (owner, approved)))
    })
    .await?;

    match found {
        Some((owner, approved)) if approved || me.can_modify(owner) => Ok(owner),
        _ => Err(missing(target)),
    }
}

async fn reaction_summary(
    state: &AppState,
    me: &CurrentUser,
    target: TargetType,
    id: Uuid,
) -> ApiResult<ReactionResponse> {
    let user_id = me.id;
    let (count, mine) = blocking(state, move |db| {
        let count = match target {
            TargetType::Prayer => db.get_prayer(id)?.map(|p| p.reaction_count),
            TargetType::Reflection => db.get_reflection(id)?.map(|r| r.reaction_count),
        };
        let mut mine = db.reactions_by_user(user_id, target, &[id])?;
        Ok((count, mine.remove(&id).unwrap_or_default()))
    })
    .await?;

    Ok(ReactionResponse {
        reaction_count: count.ok_or_else(|| missing(target))?,
        my_reactions: mine,
    })
}

pub async fn add_reaction(
    state: &AppState,
    me: &CurrentUser,
    target: TargetType,
    id: Uuid,
    kind: ReactionKind,
) -> ApiResult<ReactionResponse> {
    let owner = reachable_owner(state, me, target, id).await?;

    let user_id = me.id;
    match blocking(state, move |db| db.add_reaction(user_id, target, id, kind)).await? {
        ReactionOutcome::Added => {}
        ReactionOutcome::Duplicate => return Err(ApiError::bad_request("Already reacted")),
        ReactionOutcome::TargetMissing => return Err(missing(target)),
    }

    if owner != me.id {
        let title = match kind {
            ReactionKind::Prayed => format!("{} prayed for your {}", me.name, noun(target)),
            ReactionKind::Like => format!("{} liked your {}", me.name, noun(target)),
        };
        notify::fan_out(
            state,
            vec![owner],
            NewNotification {
                kind: NotificationKind::Reaction,
                title,
                body: String::new(),
                link: Some(link(target, id)),
            },
        );
    }

    reaction_summary(state, me, target, id).await
}

pub async fn remove_reaction(
    state: &AppState,
    me: &CurrentUser,
    target: TargetType,
    id: Uuid,
    kind: ReactionKind,
) -> ApiResult<ReactionResponse> {
    reachable_owner(state, me, target, id).await?;

    let user_id = me.id;
    let (removal, mut mine) = blocking(state, move |db| {
        let removal = db.remove_reaction(user_id, target, id, kind)?;
        Ok((removal, db.reactions_by_user(user_id, target, &[id])?))
    })
    .await?;

    match removal {
        ReactionRemoval::Removed { reaction_count } => Ok(ReactionResponse {
            reaction_count,
            my_reactions: mine.remove(&id).unwrap_or_default(),
        }),
        ReactionRemoval::NotReacted => Err(ApiError::NotFound("Reaction not found")),
        ReactionRemoval::TargetMissing => Err(missing(target)),
    }
}

pub async fn list_comments(
    state: &AppState,
    me: &CurrentUser,
    target: TargetType,
    id: Uuid,
) -> ApiResult<Vec<Comment>> {
    reachable_owner(state, me, target, id).await?;
    let rows = blocking(state, move |db| db.list_comments(target, id)).await?;
    Ok(rows.into_iter().map(views::comment).collect())
}

pub async fn add_comment(
    state: &AppState,
    me: &CurrentUser,
    target: TargetType,
    id: Uuid,
    content: String,
) -> ApiResult<Comment> {
    let owner = reachable_owner(state, me, target, id).await?;

    let user_id = me.id;
    let content = content.trim().to_string();
    let row = blocking(state, move |db| db.add_comment(user_id, target, id, &content))
        .await?
        .ok_or_else(|| missing(target))?;

    if owner != me.id {
        notify::fan_out(
            state,
            vec![owner],
            NewNotification {
                kind: NotificationKind::Comment,
                title: format!("{} commented on your {}", me.name, noun(target)),
                body: notify::excerpt(&row.content, 140),
                link: Some(link(target, id)),
            },
        );
    }

    Ok(views::comment(row))
}
