//! In-app notifications with email and push delivery.
//!
//! Everything here is fire-and-forget from the caller's point of view:
//! handlers spawn the work and return, failures are logged.

pub mod email;
pub mod push;

use futures_util::future::join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use fellowship_db::models::NewNotification;

use crate::state::{AppState, blocking};
use push::PushMessage;

/// Stores the notification for `user_id`, then emails and pushes it
/// according to the user's preferences for its category.
pub async fn deliver(state: &AppState, user_id: Uuid, new: NewNotification) -> anyhow::Result<()> {
    let category = new.kind.category();
    let (row, prefs, user) = blocking(state, move |db| {
        let row = db.insert_notification(user_id, &new)?;
        let prefs = db.notification_preferences(user_id)?;
        let user = db.get_user(user_id)?;
        Ok((row, prefs, user))
    })
    .await?;
    let Some(user) = user else {
        return Ok(());
    };

    let mut email_sent = false;
    if let (true, Some(mailer)) = (prefs.email_enabled(category), &state.mailer) {
        let text = email_text(&state.public_url, &row.body, row.link.as_deref());
        match mailer.send(&user.email, &row.title, &text).await {
            Ok(()) => email_sent = true,
            Err(e) => warn!("Email to {} failed: {:#}", user.email, e),
        }
    }

    let mut push_sent = false;
    if let (true, Some(client)) = (prefs.push_enabled(category), &state.push) {
        let (tokens, unread) = blocking(state, move |db| Ok((db.device_tokens(user_id)?, db.unread_count(user_id)?))).await?;
        if !tokens.is_empty() {
            let messages: Vec<PushMessage> = tokens
                .into_iter()
                .map(|token| PushMessage::alert(token, &row.title, &row.body, unread, row.link.as_deref()))
                .collect();
            match client.send(&messages).await {
                Ok(report) => {
                    push_sent = report.delivered > 0;
                    prune_tokens(state, report.unregistered).await;
                }
                Err(e) => warn!("Push to user {} failed: {:#}", user_id, e),
            }
        }
    }

    if email_sent || push_sent {
        let id = row.id;
        blocking(state, move |db| db.record_delivery(id, email_sent, push_sent)).await?;
    }
    Ok(())
}

/// Delivers `new` to every recipient concurrently on a background task.
pub fn fan_out(state: &AppState, recipients: Vec<Uuid>, new: NewNotification) {
    if recipients.is_empty() {
        return;
    }
    let state = state.clone();
    tokio::spawn(async move {
        debug!("Fanning out {:?} notification to {} users", new.kind, recipients.len());
        let deliveries = recipients.into_iter().map(|user_id| {
            let state = state.clone();
            let new = new.clone();
            async move {
                if let Err(e) = deliver(&state, user_id, new).await {
                    warn!("Notification to user {} failed: {:#}", user_id, e);
                }
            }
        });
        join_all(deliveries).await;
    });
}

/// Notifies every active user except `actor`.
pub fn notify_members(state: &AppState, actor: Option<Uuid>, new: NewNotification) {
    let state = state.clone();
    tokio::spawn(async move {
        match blocking(&state, move |db| db.active_user_ids(actor)).await {
            Ok(recipients) => fan_out(&state, recipients, new),
            Err(e) => warn!("Failed to load notification recipients: {:#}", e),
        }
    });
}

/// Emails all active admins. No in-app row is created.
pub fn alert_admins(state: &AppState, subject: String, text: String) {
    if state.mailer.is_none() {
        return;
    }
    let state = state.clone();
    tokio::spawn(async move {
        let emails = match blocking(&state, |db| db.admin_emails()).await {
            Ok(emails) => emails,
            Err(e) => {
                warn!("Failed to load admin emails: {:#}", e);
                return;
            }
        };
        let Some(mailer) = &state.mailer else {
            return;
        };
        let (subject, text) = (&subject, &text);
        let sends = emails.iter().map(|to| async move {
            if let Err(e) = mailer.send(to, subject, text).await {
                warn!("Admin alert to {} failed: {:#}", to, e);
            }
        });
        join_all(sends).await;
    });
}

/// Sends a silent push carrying the current unread count so app badges
/// stay accurate after notifications are read.
pub fn refresh_badge(state: &AppState, user_id: Uuid) {
    if state.push.is_none() {
        return;
    }
    let state = state.clone();
    tokio::spawn(async move {
        let loaded = blocking(&state, move |db| Ok((db.device_tokens(user_id)?, db.unread_count(user_id)?))).await;
        let (tokens, unread) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load badge state for {}: {:#}", user_id, e);
                return;
            }
        };
        let Some(client) = &state.push else {
            return;
        };
        if tokens.is_empty() {
            return;
        }
        let messages: Vec<PushMessage> = tokens
            .into_iter()
            .map(|token| PushMessage::badge_only(token, unread))
            .collect();
        match client.send(&messages).await {
            Ok(report) => prune_tokens(&state, report.unregistered).await,
            Err(e) => warn!("Badge update for {} failed: {:#}", user_id, e),
        }
    });
}

async fn prune_tokens(state: &AppState, tokens: Vec<String>) {
    if tokens.is_empty() {
        return;
    }
    match blocking(state, move |db| db.prune_device_tokens(&tokens)).await {
        Ok(n) => debug!("Pruned {} unregistered device tokens", n),
        Err(e) => warn!("Failed to prune device tokens: {:#}", e),
    }
}

fn email_text(public_url: &str, body: &str, link: Option<&str>) -> String {
    match link {
        Some(link) if link.starts_with("http://") || link.starts_with("https://") => {
            format!("{}\n\n{}", body, link)
        }
        Some(link) => format!("{}\n\n{}{}", body, public_url.trim_end_matches('/'), link),
        None => body.to_string(),
    }
}

/// Shortens user content for notification bodies.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_point_at_the_site() {
        assert_eq!(
            email_text("https://church.example/", "Supper is on", Some("/events/1")),
            "Supper is on\n\nhttps://church.example/events/1"
        );
        assert_eq!(email_text("https://church.example", "Hi", None), "Hi");
    }

    #[test]
    fn long_text_is_cut_on_characters() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
    }
}
