//! Integration tests for the SQLite storage layer
//!
//! Run with: cargo test --test storage_test

use chrono::{TimeZone, Utc};
use metabolic_center::core::detox::DayOutcome;
use metabolic_center::core::food::{DailyTotals, FoodEstimate};
use metabolic_center::core::paywall;
use metabolic_center::core::utils::local_day_start_utc;
use metabolic_center::storage::{create_pool, db, DbPool};
use pretty_assertions::assert_eq;

fn pool() -> DbPool {
    create_pool(":memory:").unwrap()
}

fn estimate(description: &str, calories: i64) -> FoodEstimate {
    FoodEstimate {
        description: description.to_string(),
        calories,
        protein: 10.0,
        carbs: 20.0,
        fat: 5.5,
    }
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn stats_on_empty_database_are_zero() {
    let pool = pool();
    let conn = pool.get().unwrap();

    let stats = db::get_stats(&conn, 1_700_000_000).unwrap();
    assert_eq!(stats.total_users, 0);
    assert_eq!(stats.pro_users, 0);
    assert_eq!(stats.trial_users, 0);
    assert_eq!(stats.total_analyses, 0);
    assert_eq!(stats.total_chats, 0);
    assert_eq!(stats.today_activity, 0);
    assert!(stats.recent_users.is_empty());
}

#[test]
fn stats_count_usage_and_plans() {
    let pool = pool();
    let conn = pool.get().unwrap();
    let now = 1_700_000_000;

    db::ensure_user(&conn, 1, Some("a"), None, None).unwrap();
    db::ensure_user(&conn, 2, Some("b"), None, None).unwrap();
    let (mut trial, _) = db::ensure_user(&conn, 3, Some("c"), None, None).unwrap();

    db::increment_analysis_count(&conn, 1).unwrap();
    db::increment_analysis_count(&conn, 1).unwrap();
    db::increment_chat_count(&conn, 2).unwrap();
    assert!(db::set_pro(&conn, 2, true).unwrap());

    paywall::start_trial(&mut trial, now).unwrap();
    db::update_user(&conn, &trial).unwrap();

    db::log_event(&conn, 1, "ANALYSIS", "#1").unwrap();

    let stats = db::get_stats(&conn, now).unwrap();
    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.pro_users, 1);
    assert_eq!(stats.trial_users, 1);
    assert_eq!(stats.total_analyses, 2);
    assert_eq!(stats.total_chats, 1);
    assert_eq!(stats.today_users, 3);
    assert_eq!(stats.today_activity, 1);
    assert_eq!(stats.recent_users.len(), 3);
    assert_eq!(db::get_all_users(&conn).unwrap().len(), 3);
}

#[test]
fn every_event_name_is_logged_distinctly() {
    let pool = pool();
    let conn = pool.get().unwrap();
    db::ensure_user(&conn, 1, None, None, None).unwrap();

    let mut names = db::events::ALL.to_vec();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), db::events::ALL.len());
    assert_eq!(db::events::TRIAL, "TRIAL");

    for event in db::events::ALL {
        db::log_event(&conn, 1, event, "").unwrap();
    }
    let stats = db::get_stats(&conn, 1_700_000_000).unwrap();
    assert_eq!(stats.today_activity, db::events::ALL.len() as i64);
}

// ============================================================================
// Symptoms and food diary
// ============================================================================

#[test]
fn symptoms_are_listed_newest_first() {
    let pool = pool();
    let conn = pool.get().unwrap();
    db::ensure_user(&conn, 7, None, None, None).unwrap();

    db::add_symptom(&conn, 7, "headache").unwrap();
    db::add_symptom(&conn, 7, "fatigue after lunch").unwrap();

    let symptoms = db::get_symptoms(&conn, 7).unwrap();
    assert_eq!(symptoms.len(), 2);
    assert_eq!(symptoms[0].text, "fatigue after lunch");
    assert_eq!(symptoms[1].text, "headache");
    assert!(db::get_symptoms(&conn, 8).unwrap().is_empty());
}

#[test]
fn food_entries_sum_into_daily_totals() {
    let pool = pool();
    let conn = pool.get().unwrap();
    db::ensure_user(&conn, 5, None, None, None).unwrap();
    db::ensure_user(&conn, 6, None, None, None).unwrap();

    db::add_food_entry(&conn, 5, &estimate("oatmeal with berries", 350)).unwrap();
    db::add_food_entry(&conn, 5, &estimate("chicken salad", 450)).unwrap();

    let today = db::get_today_food(&conn, 5, "1970-01-01 00:00:00").unwrap();
    assert_eq!(today.len(), 2);
    assert_eq!(today[0].estimate.description, "chicken salad");

    let totals = DailyTotals::from_entries(today.iter().map(|e| &e.estimate));
    assert_eq!(totals.entries, 2);
    assert_eq!(totals.calories, 800);
    assert_eq!(totals.protein, 20.0);
    assert_eq!(totals.fat, 11.0);

    assert_eq!(db::get_recent_food(&conn, 5).unwrap().len(), 2);
    assert_eq!(db::get_users_with_food_since(&conn, "1970-01-01 00:00:00").unwrap(), vec![5]);
}

#[test]
fn food_day_is_bounded_by_local_midnight() {
    let pool = pool();
    let conn = pool.get().unwrap();
    db::ensure_user(&conn, 9, None, None, None).unwrap();

    // At UTC-5 the local day of 2026-05-03 02:00 UTC started at 2026-05-02 05:00 UTC
    for (description, created_at) in [
        ("late dinner yesterday", "2026-05-02 04:30:00"),
        ("breakfast", "2026-05-02 12:00:00"),
        ("evening snack", "2026-05-03 01:30:00"),
    ] {
        conn.execute(
            "INSERT INTO food_diary (user_id, description, calories, protein, carbs, fat, created_at)
             VALUES (9, ?1, 100, 1.0, 1.0, 1.0, ?2)",
            [description, created_at],
        )
        .unwrap();
    }

    let now = Utc.with_ymd_and_hms(2026, 5, 3, 2, 0, 0).unwrap();
    let since = local_day_start_utc(now, -5);
    let today = db::get_today_food(&conn, 9, &since).unwrap();
    let descriptions: Vec<_> = today.iter().map(|e| e.estimate.description.as_str()).collect();
    assert_eq!(descriptions, vec!["evening snack", "breakfast"]);

    // Counted from UTC midnight the evening snack would be the only entry
    assert_eq!(db::get_today_food(&conn, 9, "2026-05-03 00:00:00").unwrap().len(), 1);
    assert_eq!(db::get_users_with_food_since(&conn, "2026-05-04 00:00:00").unwrap(), Vec::<i64>::new());
}

// ============================================================================
// Detox
// ============================================================================

#[test]
fn detox_progress_survives_reload() {
    let pool = pool();
    let conn = pool.get().unwrap();
    db::ensure_user(&conn, 11, None, None, None).unwrap();

    assert!(db::get_detox(&conn, 11).unwrap().is_none());
    let mut progress = db::start_detox(&conn, 11).unwrap();
    assert_eq!(progress.day, 1);
    assert!(progress.completed.is_empty());

    assert_eq!(progress.complete_day(1), DayOutcome::Advanced { next: 2 });
    db::update_detox(&conn, &progress).unwrap();

    let reloaded = db::get_detox(&conn, 11).unwrap().unwrap();
    assert_eq!(reloaded.day, 2);
    assert_eq!(reloaded.completed, vec![1]);

    let active = db::get_active_detox_users(&conn).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].0.id, 11);
}

#[test]
fn finished_and_restarted_detox() {
    let pool = pool();
    let conn = pool.get().unwrap();
    db::ensure_user(&conn, 12, None, None, None).unwrap();

    let mut progress = db::start_detox(&conn, 12).unwrap();
    for day in 1..=6 {
        progress.complete_day(day);
    }
    assert_eq!(progress.complete_day(7), DayOutcome::Finished);
    db::update_detox(&conn, &progress).unwrap();

    assert!(db::get_active_detox_users(&conn).unwrap().is_empty());

    let restarted = db::start_detox(&conn, 12).unwrap();
    assert_eq!(restarted.day, 1);
    assert!(restarted.completed.is_empty());
    assert_eq!(db::get_active_detox_users(&conn).unwrap().len(), 1);
}

// ============================================================================
// Referrals and trials
// ============================================================================

#[test]
fn referral_lookup_and_count() {
    let pool = pool();
    let conn = pool.get().unwrap();

    let (mut referrer, _) = db::ensure_user(&conn, 100, Some("ref"), None, None).unwrap();
    referrer.referral_code = Some(paywall::referral_code(referrer.id));
    db::update_user(&conn, &referrer).unwrap();

    let code = referrer.referral_code.clone().unwrap();
    let found = db::get_user_by_referral(&conn, &code).unwrap().unwrap();
    assert_eq!(found.id, 100);
    assert!(db::get_user_by_referral(&conn, "MCNOPE").unwrap().is_none());

    for id in [201, 202] {
        let (mut newcomer, created) = db::ensure_user(&conn, id, None, None, None).unwrap();
        assert!(created);
        newcomer.referred_by = 100;
        db::update_user(&conn, &newcomer).unwrap();
    }
    assert_eq!(db::count_referrals(&conn, 100).unwrap(), 2);
    assert_eq!(db::count_referrals(&conn, 201).unwrap(), 0);
}

#[test]
fn expire_trials_clears_only_elapsed_windows() {
    let pool = pool();
    let conn = pool.get().unwrap();
    let now = 1_700_000_000;

    let (mut expired, _) = db::ensure_user(&conn, 1, None, None, None).unwrap();
    expired.trial_expires = now - 10;
    expired.trial_used = true;
    db::update_user(&conn, &expired).unwrap();

    let (mut active, _) = db::ensure_user(&conn, 2, None, None, None).unwrap();
    active.trial_expires = now + 3600;
    active.trial_used = true;
    db::update_user(&conn, &active).unwrap();

    assert_eq!(db::expire_trials(&conn, now).unwrap(), 1);
    assert_eq!(db::expire_trials(&conn, now).unwrap(), 0);

    let expired = db::get_user(&conn, 1).unwrap().unwrap();
    assert_eq!(expired.trial_expires, 0);
    assert!(expired.trial_used);
    assert_eq!(db::get_user(&conn, 2).unwrap().unwrap().trial_expires, now + 3600);
}

#[test]
fn file_database_persists_between_pools() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metabolic.db");
    let path = path.to_str().unwrap();

    {
        let pool = create_pool(path).unwrap();
        let conn = pool.get().unwrap();
        db::ensure_user(&conn, 55, Some("persisted"), None, None).unwrap();
    }

    let pool = create_pool(path).unwrap();
    let conn = pool.get().unwrap();
    let user = db::get_user(&conn, 55).unwrap().unwrap();
    assert_eq!(user.username.as_deref(), Some("persisted"));
}
