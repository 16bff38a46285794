//! Integration tests for the dashboard aggregates.
//!
//! Tests cover:
//! - Streak and week stats over seeded completed sessions
//! - Suggestion priority: today's schedule, then longest idle
//! - The empty-database landing state

mod common;

use chrono::{Datelike, Duration, Local, Utc};
use common::*;
use ironlog::dashboard::{self, SuggestionReason};

#[tokio::test]
async fn empty_database_has_no_history() -> anyhow::Result<()> {
    let pool = test_pool().await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    assert!(!dash.has_history);
    assert!(!dash.worked_out_today);
    assert_eq!(dash.streak_days, 0);
    assert_eq!(dash.this_week.completed_sessions, 0);
    assert_eq!(dash.suggested, None);

    Ok(())
}

#[tokio::test]
async fn consecutive_days_build_a_streak() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    for n in [0, 1, 2] {
        seed_completed_session(&pool, None, "Freeform", days_ago(n), &[(&bench, 8, 80.0)]).await;
    }
    // A session before the gap does not count.
    seed_completed_session(&pool, None, "Freeform", days_ago(5), &[(&bench, 8, 80.0)]).await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    assert!(dash.has_history);
    assert!(dash.worked_out_today);
    assert_eq!(dash.streak_days, 3);

    Ok(())
}

#[tokio::test]
async fn streak_survives_an_open_today() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    seed_completed_session(&pool, None, "Freeform", days_ago(1), &[(&bench, 8, 80.0)]).await;
    seed_completed_session(&pool, None, "Freeform", days_ago(2), &[(&bench, 8, 80.0)]).await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    assert!(!dash.worked_out_today);
    assert_eq!(dash.streak_days, 2, "today being open must not break the streak");

    Ok(())
}

#[tokio::test]
async fn week_stats_cover_monday_through_sunday() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let today = Local::now().date_naive();
    let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);

    seed_completed_session(
        &pool,
        None,
        "Freeform",
        local_noon(week_start),
        &[(&bench, 8, 80.0)],
    )
    .await;
    // Last week's Monday stays out of this week's stats.
    seed_completed_session(
        &pool,
        None,
        "Freeform",
        local_noon(week_start - Duration::days(7)),
        &[(&bench, 8, 80.0)],
    )
    .await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    assert_eq!(dash.this_week.completed_sessions, 1);
    assert!(dash.this_week.active_days[0], "Monday should be marked active");

    Ok(())
}

#[tokio::test]
async fn scheduled_template_wins_todays_suggestion() -> anyhow::Result<()> {
    let pool = test_pool().await;

    let weekday = Local::now().date_naive().weekday().num_days_from_monday() as u8;
    let legs = seed_template(&pool, "Leg Day", Some(weekday)).await;
    seed_template(&pool, "Arm Day", None).await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    let suggested = dash.suggested.expect("a template should be suggested");
    assert_eq!(suggested.template_id, legs);
    assert_eq!(suggested.reason, SuggestionReason::ScheduledToday);

    Ok(())
}

#[tokio::test]
async fn longest_idle_template_is_suggested() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let push = seed_template(&pool, "Push Day", None).await;
    let pull = seed_template(&pool, "Pull Day", None).await;
    seed_completed_session(&pool, Some(&push), "Push Day", days_ago(3), &[(&bench, 8, 80.0)]).await;
    seed_completed_session(&pool, Some(&pull), "Pull Day", days_ago(9), &[(&bench, 8, 60.0)]).await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    let suggested = dash.suggested.expect("a template should be suggested");
    assert_eq!(suggested.template_id, pull);
    assert_eq!(
        suggested.reason,
        SuggestionReason::LongestGap { days_since: Some(9) }
    );

    Ok(())
}

#[tokio::test]
async fn never_performed_template_outranks_all() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let push = seed_template(&pool, "Push Day", None).await;
    let pull = seed_template(&pool, "Pull Day", None).await;
    seed_completed_session(&pool, Some(&push), "Push Day", days_ago(1), &[(&bench, 8, 80.0)]).await;

    let dash = dashboard::get_dashboard(&pool, Utc::now()).await?;
    let suggested = dash.suggested.expect("a template should be suggested");
    assert_eq!(suggested.template_id, pull);
    assert_eq!(
        suggested.reason,
        SuggestionReason::LongestGap { days_since: None }
    );

    Ok(())
}
