use chrono::{Duration, Utc};
use uuid::Uuid;

use fellowship_types::models::{
    AssetKind, NotificationKind, NotificationPreferences, Platform, PrayerKind, ReactionKind, Role, TargetType,
    UserStatus,
};

use crate::Database;
use crate::models::{
    EventFields, KidsAssetFields, NewNotification, NewPrayer, NewUser, PrayerFilter, ReactionOutcome, ReactionRemoval,
    RecipeFields, ReflectionFilter, RsvpOutcome,
};

fn db() -> Database {
    Database::open_in_memory().unwrap()
}

fn user(db: &Database, email: &str) -> Uuid {
    let id = Uuid::new_v4();
    db.create_user(&NewUser {
        id,
        email,
        name: email.split('@').next().unwrap(),
        password_hash: "hash",
    })
    .unwrap()
    .unwrap();
    id
}

fn event(db: &Database, owner: Uuid, capacity: Option<u32>) -> Uuid {
    let id = Uuid::new_v4();
    db.insert_event(
        id,
        owner,
        &EventFields {
            title: "Harvest supper".into(),
            description: String::new(),
            location: Some("Fellowship hall".into()),
            starts_at: Utc::now() + Duration::days(3),
            ends_at: None,
            capacity,
            is_potluck: true,
            is_published: true,
        },
    )
    .unwrap();
    id
}

fn prayer(db: &Database, owner: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    db.insert_prayer(&NewPrayer {
        id,
        user_id: owner,
        kind: PrayerKind::Request,
        content: "Pray for my grandmother's surgery",
        is_anonymous: false,
        is_approved: true,
    })
    .unwrap();
    id
}

fn recipe(db: &Database, owner: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    db.insert_recipe(
        id,
        owner,
        &RecipeFields {
            title: "Cornbread".into(),
            description: String::new(),
            ingredients: vec!["1 cup cornmeal".into(), "1 egg".into()],
            instructions: "Mix and bake.".into(),
            servings: Some(8),
            prep_minutes: Some(10),
            cook_minutes: Some(25),
            image_url: None,
        },
    )
    .unwrap();
    id
}

fn count(db: &Database, sql: &str) -> i64 {
    db.with_conn(|conn| Ok(conn.query_row(sql, [], |r| r.get(0))?)).unwrap()
}

#[test]
fn first_user_becomes_admin() {
    let db = db();
    let first = user(&db, "pastor@example.org");
    let second = user(&db, "member@example.org");

    assert_eq!(db.get_user(first).unwrap().unwrap().role, Role::Admin);
    assert_eq!(db.get_user(second).unwrap().unwrap().role, Role::Member);
}

#[test]
fn duplicate_email_is_rejected() {
    let db = db();
    user(&db, "ruth@example.org");
    let again = db
        .create_user(&NewUser {
            id: Uuid::new_v4(),
            email: "ruth@example.org",
            name: "Ruth",
            password_hash: "hash",
        })
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn rsvp_beyond_capacity_is_rejected() {
    let db = db();
    let admin = user(&db, "admin@example.org");
    let a = user(&db, "a@example.org");
    let b = user(&db, "b@example.org");
    let ev = event(&db, admin, Some(5));

    assert!(matches!(db.upsert_rsvp(ev, a, 2, 2, None).unwrap(), RsvpOutcome::Saved(_)));
    match db.upsert_rsvp(ev, b, 2, 0, None).unwrap() {
        RsvpOutcome::OverCapacity { remaining } => assert_eq!(remaining, 1),
        other => panic!("expected over capacity, got {:?}", other),
    }
    assert!(matches!(db.upsert_rsvp(ev, b, 1, 0, None).unwrap(), RsvpOutcome::Saved(_)));

    let row = db.get_event(ev).unwrap().unwrap();
    assert_eq!(row.rsvp_count, 2);
    assert_eq!(row.attendee_count, 5);
}

#[test]
fn rsvp_update_releases_own_seats_first() {
    let db = db();
    let admin = user(&db, "admin@example.org");
    let a = user(&db, "a@example.org");
    let ev = event(&db, admin, Some(4));

    assert!(matches!(db.upsert_rsvp(ev, a, 2, 2, None).unwrap(), RsvpOutcome::Saved(_)));
    // Replacing 4 seats with 3 must not count the old 4 against capacity.
    let saved = match db.upsert_rsvp(ev, a, 1, 2, Some("green beans")).unwrap() {
        RsvpOutcome::Saved(row) => row,
        other => panic!("expected saved, got {:?}", other),
    };
    assert_eq!(saved.dish.as_deref(), Some("green beans"));
    assert_eq!(db.list_rsvps(ev).unwrap().len(), 1);
}

#[test]
fn rsvp_for_missing_event() {
    let db = db();
    let a = user(&db, "a@example.org");
    assert!(matches!(
        db.upsert_rsvp(Uuid::new_v4(), a, 1, 0, None).unwrap(),
        RsvpOutcome::EventMissing
    ));
}

#[test]
fn duplicate_reaction_is_rejected_and_counter_tracks_rows() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let friend = user(&db, "friend@example.org");
    let p = prayer(&db, owner);

    assert_eq!(
        db.add_reaction(friend, TargetType::Prayer, p, ReactionKind::Prayed).unwrap(),
        ReactionOutcome::Added
    );
    assert_eq!(
        db.add_reaction(friend, TargetType::Prayer, p, ReactionKind::Prayed).unwrap(),
        ReactionOutcome::Duplicate
    );
    assert_eq!(
        db.add_reaction(friend, TargetType::Prayer, p, ReactionKind::Like).unwrap(),
        ReactionOutcome::Added
    );
    assert_eq!(db.get_prayer(p).unwrap().unwrap().reaction_count, 2);

    assert_eq!(
        db.remove_reaction(friend, TargetType::Prayer, p, ReactionKind::Like).unwrap(),
        ReactionRemoval::Removed { reaction_count: 1 }
    );
    assert_eq!(
        db.remove_reaction(friend, TargetType::Prayer, p, ReactionKind::Like).unwrap(),
        ReactionRemoval::NotReacted
    );
    assert_eq!(db.get_prayer(p).unwrap().unwrap().reaction_count, 1);

    let mine = db.reactions_by_user(friend, TargetType::Prayer, &[p]).unwrap();
    assert_eq!(mine.get(&p), Some(&vec![ReactionKind::Prayed]));
}

#[test]
fn soft_deleted_prayers_leave_listings_and_refuse_reactions() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let kept = prayer(&db, owner);
    let removed = prayer(&db, owner);

    assert!(db.soft_delete_prayer(removed).unwrap());
    assert!(!db.soft_delete_prayer(removed).unwrap());

    let listed = db
        .list_prayers(&PrayerFilter { viewer: owner, kind: None, before: None, before_id: None, limit: 50 })
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![kept]);

    assert!(db.get_prayer(removed).unwrap().is_none());
    assert_eq!(
        db.add_reaction(owner, TargetType::Prayer, removed, ReactionKind::Like).unwrap(),
        ReactionOutcome::TargetMissing
    );
    assert!(db.add_comment(owner, TargetType::Prayer, removed, "hi").unwrap().is_none());
}

#[test]
fn reactions_on_deleted_prayers_stay_put() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let friend = user(&db, "friend@example.org");
    let p = prayer(&db, owner);

    db.add_reaction(friend, TargetType::Prayer, p, ReactionKind::Prayed).unwrap();
    assert!(db.soft_delete_prayer(p).unwrap());

    assert_eq!(
        db.remove_reaction(friend, TargetType::Prayer, p, ReactionKind::Prayed).unwrap(),
        ReactionRemoval::TargetMissing
    );
    assert_eq!(count(&db, "SELECT COUNT(*) FROM reactions"), 1);
}

#[test]
fn unapproved_prayers_are_visible_only_to_their_author() {
    let db = db();
    let author = user(&db, "author@example.org");
    let other = user(&db, "other@example.org");
    let id = Uuid::new_v4();
    db.insert_prayer(&NewPrayer {
        id,
        user_id: author,
        kind: PrayerKind::Praise,
        content: "New job!",
        is_anonymous: true,
        is_approved: false,
    })
    .unwrap();

    let for_author = db
        .list_prayers(&PrayerFilter { viewer: author, kind: None, before: None, before_id: None, limit: 10 })
        .unwrap();
    let for_other = db
        .list_prayers(&PrayerFilter { viewer: other, kind: None, before: None, before_id: None, limit: 10 })
        .unwrap();
    assert_eq!(for_author.len(), 1);
    assert!(for_other.is_empty());

    assert_eq!(db.list_pending_prayers().unwrap().len(), 1);
    assert!(db.approve_prayer(id).unwrap().is_some());
    assert!(db.approve_prayer(id).unwrap().is_none());
    assert!(db.list_pending_prayers().unwrap().is_empty());
}

#[test]
fn prayer_kind_filter_and_cursor() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let first = prayer(&db, owner);
    let second = prayer(&db, owner);

    let page = db
        .list_prayers(&PrayerFilter { viewer: owner, kind: None, before: None, before_id: None, limit: 1 })
        .unwrap();
    assert_eq!(page[0].id, second);

    let next = db
        .list_prayers(&PrayerFilter {
            viewer: owner,
            kind: None,
            before: Some(page[0].created_at),
            before_id: Some(page[0].id),
            limit: 1,
        })
        .unwrap();
    assert_eq!(next[0].id, first);

    let praise = db
        .list_prayers(&PrayerFilter {
            viewer: owner,
            kind: Some(PrayerKind::Praise),
            before: None,
            before_id: None,
            limit: 10,
        })
        .unwrap();
    assert!(praise.is_empty());
}

#[test]
fn paging_walks_rows_that_share_a_timestamp() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let mut prayers: Vec<Uuid> = (0..3).map(|_| prayer(&db, owner)).collect();
    for _ in 0..3 {
        db.insert_reflection(Uuid::new_v4(), owner, "Morning", "...", &["hope".into()]).unwrap();
    }
    let stamp = Utc::now();
    db.with_conn(|conn| {
        conn.execute("UPDATE prayers SET created_at = ?1", [stamp])?;
        conn.execute("UPDATE reflections SET created_at = ?1", [stamp])?;
        Ok(())
    })
    .unwrap();

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = db
            .list_prayers(&PrayerFilter {
                viewer: owner,
                kind: None,
                before: cursor.map(|(at, _)| at),
                before_id: cursor.map(|(_, id)| id),
                limit: 1,
            })
            .unwrap();
        let Some(last) = page.last() else { break };
        cursor = Some((last.created_at, last.id));
        seen.push(last.id);
    }
    // Ids are stored as hyphenated lowercase text, which sorts like the bytes.
    prayers.sort_by(|a, b| b.cmp(a));
    assert_eq!(seen, prayers);

    let first = db
        .list_reflections(&ReflectionFilter { tag: None, before: None, before_id: None, limit: 2 })
        .unwrap();
    let rest = db
        .list_reflections(&ReflectionFilter {
            tag: None,
            before: Some(first[1].created_at),
            before_id: Some(first[1].id),
            limit: 2,
        })
        .unwrap();
    assert_eq!(first.len() + rest.len(), 3);
    assert!(rest.iter().all(|r| first.iter().all(|f| f.id != r.id)));

    // Without an id the timestamp alone is exclusive.
    let strict = db
        .list_prayers(&PrayerFilter { viewer: owner, kind: None, before: Some(stamp), before_id: None, limit: 10 })
        .unwrap();
    assert!(strict.is_empty());
}

#[test]
fn comments_keep_target_counter_in_sync() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let reflection = db
        .insert_reflection(Uuid::new_v4(), owner, "Still waters", "Psalm 23 thoughts", &["peace".into()])
        .unwrap();

    let c1 = db
        .add_comment(owner, TargetType::Reflection, reflection.id, "Amen")
        .unwrap()
        .unwrap();
    db.add_comment(owner, TargetType::Reflection, reflection.id, "Thank you").unwrap().unwrap();
    assert_eq!(db.get_reflection(reflection.id).unwrap().unwrap().comment_count, 2);

    assert!(db.delete_comment(c1.id).unwrap());
    assert_eq!(db.get_reflection(reflection.id).unwrap().unwrap().comment_count, 1);
    assert_eq!(db.list_comments(TargetType::Reflection, reflection.id).unwrap().len(), 1);
}

#[test]
fn reflections_filter_by_tag_and_hide_deleted() {
    let db = db();
    let owner = user(&db, "owner@example.org");
    let grace = db
        .insert_reflection(Uuid::new_v4(), owner, "Grace", "...", &["grace".into(), "hope".into()])
        .unwrap();
    let hope = db
        .insert_reflection(Uuid::new_v4(), owner, "Hope", "...", &["hope".into()])
        .unwrap();

    let tagged = db
        .list_reflections(&ReflectionFilter { tag: Some("grace"), before: None, before_id: None, limit: 50 })
        .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, grace.id);
    assert_eq!(tagged[0].tags, vec!["grace", "hope"]);

    assert!(db.soft_delete_reflection(hope.id).unwrap());
    let all = db
        .list_reflections(&ReflectionFilter { tag: None, before: None, before_id: None, limit: 50 })
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[test]
fn recipe_average_matches_rating_rows() {
    let db = db();
    let cook = user(&db, "cook@example.org");
    let a = user(&db, "a@example.org");
    let b = user(&db, "b@example.org");
    let r = recipe(&db, cook);

    db.rate_recipe(r, a, 5).unwrap().unwrap();
    let summary = db.rate_recipe(r, b, 2).unwrap().unwrap();
    assert_eq!(summary.count, 2);
    assert!((summary.average - 3.5).abs() < f64::EPSILON);

    // Re-rating replaces rather than adds.
    let summary = db.rate_recipe(r, b, 4).unwrap().unwrap();
    assert_eq!(summary.count, 2);
    assert!((summary.average - 4.5).abs() < f64::EPSILON);

    let summary = db.remove_rating(r, a).unwrap().unwrap();
    assert_eq!(summary.count, 1);
    assert!((summary.average - 4.0).abs() < f64::EPSILON);

    let row = db.get_recipe(r).unwrap().unwrap();
    let mean: f64 = db
        .with_conn(|conn| Ok(conn.query_row("SELECT AVG(score) FROM recipe_ratings", [], |r| r.get(0))?))
        .unwrap();
    assert!((row.rating_average - mean).abs() < f64::EPSILON);
    assert_eq!(db.ratings_by_user(b, &[r]).unwrap().get(&r), Some(&4));

    assert!(db.remove_rating(r, a).unwrap().is_none());
    assert!(db.rate_recipe(Uuid::new_v4(), a, 3).unwrap().is_none());
}

#[test]
fn recipe_search_escapes_wildcards() {
    let db = db();
    let cook = user(&db, "cook@example.org");
    recipe(&db, cook);

    assert_eq!(db.list_recipes(Some("corn")).unwrap().len(), 1);
    assert_eq!(db.list_recipes(Some("%")).unwrap().len(), 0);
    assert_eq!(db.list_recipes(None).unwrap().len(), 1);
}

#[test]
fn deleting_a_user_cascades_and_recomputes_counters() {
    let db = db();
    let admin = user(&db, "admin@example.org");
    let leaving = user(&db, "leaving@example.org");
    let staying = user(&db, "staying@example.org");

    let their_prayer = prayer(&db, leaving);
    let other_prayer = prayer(&db, staying);
    let ev = event(&db, admin, None);
    let r = recipe(&db, staying);

    db.add_reaction(staying, TargetType::Prayer, their_prayer, ReactionKind::Prayed).unwrap();
    db.add_comment(staying, TargetType::Prayer, their_prayer, "Praying").unwrap();
    db.add_reaction(leaving, TargetType::Prayer, other_prayer, ReactionKind::Prayed).unwrap();
    db.add_comment(leaving, TargetType::Prayer, other_prayer, "With you").unwrap();
    db.upsert_rsvp(ev, leaving, 1, 0, None).unwrap();
    db.rate_recipe(r, leaving, 1).unwrap();
    db.rate_recipe(r, staying, 5).unwrap();
    db.upsert_device_token(leaving, "ExponentPushToken[abc]", Platform::Ios).unwrap();
    db.insert_notification(
        leaving,
        &NewNotification {
            kind: NotificationKind::Announcement,
            title: "Hi".into(),
            body: "Welcome".into(),
            link: None,
        },
    )
    .unwrap();

    let deleted = db.delete_user(leaving).unwrap().unwrap();
    assert_eq!(deleted.email, "leaving@example.org");

    assert_eq!(count(&db, "SELECT COUNT(*) FROM prayers"), 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM reactions"), 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM comments"), 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM rsvps"), 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM device_tokens"), 0);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM notifications"), 0);

    let other = db.get_prayer(other_prayer).unwrap().unwrap();
    assert_eq!(other.reaction_count, 0);
    assert_eq!(other.comment_count, 0);

    let recipe = db.get_recipe(r).unwrap().unwrap();
    assert_eq!(recipe.rating_count, 1);
    assert!((recipe.rating_average - 5.0).abs() < f64::EPSILON);

    assert!(db.delete_user(leaving).unwrap().is_none());
}

#[test]
fn role_and_status_updates() {
    let db = db();
    user(&db, "admin@example.org");
    let m = user(&db, "m@example.org");

    let row = db
        .update_role_status(m, Some(Role::Admin), Some(UserStatus::Suspended))
        .unwrap()
        .unwrap();
    assert_eq!(row.role, Role::Admin);
    assert_eq!(row.status, UserStatus::Suspended);

    assert!(db.active_user_ids(None).unwrap().len() == 1);
    assert_eq!(db.admin_emails().unwrap(), vec!["admin@example.org".to_string()]);
}

#[test]
fn playlists_append_and_reorder() {
    let db = db();
    let a = db.insert_playlist(Uuid::new_v4(), "Hymns", "", "https://example.com/a").unwrap();
    let b = db.insert_playlist(Uuid::new_v4(), "Worship", "", "https://example.com/b").unwrap();
    assert_eq!((a.sort_index, b.sort_index), (0, 1));

    assert!(!db.reorder_playlists(&[b.id]).unwrap());
    assert!(db.reorder_playlists(&[b.id, a.id]).unwrap());

    let ids: Vec<Uuid> = db.list_playlists().unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[test]
fn kids_assets_files_and_verses() {
    let db = db();
    let admin = user(&db, "admin@example.org");
    let verse = db
        .insert_kids_asset(
            Uuid::new_v4(),
            AssetKind::Verse,
            admin,
            &KidsAssetFields {
                title: "Light".into(),
                description: String::new(),
                content: Some("Your word is a lamp to my feet".into()),
                reference: Some("Psalm 119:105".into()),
            },
        )
        .unwrap();
    let page = db
        .insert_kids_asset(
            Uuid::new_v4(),
            AssetKind::Coloring,
            admin,
            &KidsAssetFields {
                title: "Noah's ark".into(),
                description: String::new(),
                content: None,
                reference: None,
            },
        )
        .unwrap();

    let (updated, previous) = db.set_kids_asset_file(page.id, "kids/one.png").unwrap().unwrap();
    assert_eq!(updated.file_key.as_deref(), Some("kids/one.png"));
    assert!(previous.is_none());
    let (_, previous) = db.set_kids_asset_file(page.id, "kids/two.png").unwrap().unwrap();
    assert_eq!(previous.as_deref(), Some("kids/one.png"));

    db.increment_downloads(page.id).unwrap();
    assert_eq!(db.get_kids_asset(page.id).unwrap().unwrap().download_count, 1);

    let verses = db.list_verses().unwrap();
    assert_eq!(verses.len(), 1);
    assert_eq!(verses[0].id, verse.id);
    assert_eq!(db.list_kids_assets(Some(AssetKind::Coloring)).unwrap().len(), 1);

    let removed = db.delete_kids_asset(page.id).unwrap().unwrap();
    assert_eq!(removed.file_key.as_deref(), Some("kids/two.png"));
}

#[test]
fn notifications_are_scoped_to_their_owner() {
    let db = db();
    let a = user(&db, "a@example.org");
    let b = user(&db, "b@example.org");
    let n = db
        .insert_notification(
            a,
            &NewNotification {
                kind: NotificationKind::Event,
                title: "Picnic".into(),
                body: "Sunday at noon".into(),
                link: Some("/events/1".into()),
            },
        )
        .unwrap();

    assert_eq!(db.unread_count(a).unwrap(), 1);
    assert!(!db.mark_notification_read(b, n.id).unwrap());
    assert!(db.mark_notification_read(a, n.id).unwrap());
    assert_eq!(db.unread_count(a).unwrap(), 0);
    assert!(db.list_notifications(a, true, 50).unwrap().is_empty());
    assert_eq!(db.list_notifications(a, false, 50).unwrap().len(), 1);

    db.record_delivery(n.id, true, false).unwrap();
    let row = &db.list_notifications(a, false, 50).unwrap()[0];
    assert!(row.email_sent && !row.push_sent);

    assert!(!db.delete_notification(b, n.id).unwrap());
    assert!(db.delete_notification(a, n.id).unwrap());
}

#[test]
fn preferences_default_on_and_persist() {
    let db = db();
    let a = user(&db, "a@example.org");
    assert_eq!(db.notification_preferences(a).unwrap(), NotificationPreferences::default());

    let prefs = NotificationPreferences {
        email_prayers: false,
        ..Default::default()
    };
    db.save_notification_preferences(a, &prefs).unwrap();
    db.save_notification_preferences(a, &prefs).unwrap();
    assert!(!db.notification_preferences(a).unwrap().email_prayers);
}

#[test]
fn device_tokens_move_between_accounts() {
    let db = db();
    let a = user(&db, "a@example.org");
    let b = user(&db, "b@example.org");

    db.upsert_device_token(a, "tok-1", Platform::Android).unwrap();
    let row = db.upsert_device_token(b, "tok-1", Platform::Android).unwrap();
    assert_eq!(row.user_id, b);
    assert!(db.device_tokens(a).unwrap().is_empty());
    assert_eq!(db.device_tokens(b).unwrap(), vec!["tok-1".to_string()]);

    assert_eq!(db.prune_device_tokens(&["tok-1".to_string()]).unwrap(), 1);
    assert!(db.device_tokens(b).unwrap().is_empty());
}

#[test]
fn settings_singleton_round_trip() {
    let db = db();
    assert!(!db.site_settings().unwrap().prayer_moderation);
    db.save_site_settings(&fellowship_types::models::SiteSettings { prayer_moderation: true })
        .unwrap();
    assert!(db.site_settings().unwrap().prayer_moderation);
}
