//! Integration tests for workout completion against the database.
//!
//! Tests cover:
//! - A finished workout lands as one session row plus its completed sets
//! - Storage failure rolls everything back and keeps the workout active
//! - Abandoning a workout writes nothing

mod common;

use chrono::{DateTime, Duration, Utc};
use common::*;
use ironlog::session::{ActiveExercise, SessionManager};

#[tokio::test]
async fn completing_a_workout_writes_session_and_sets() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;
    let tpl = seed_template(&pool, "Push Day", None).await;

    let start = Utc::now() - Duration::minutes(45);
    let mut mgr = SessionManager::new(None, 90);
    mgr.start_workout(
        Some(tpl.clone()),
        "Push Day",
        vec![ActiveExercise::planned(bench.as_str(), "Bench Press", 3)],
        start,
    )?;

    mgr.complete_set(&bench, 1, 8, 100.0, start + Duration::minutes(5))?;
    mgr.complete_set(&bench, 2, 7, 100.0, start + Duration::minutes(10))?;

    // The third planned set stays pending and must not be written.
    let receipt = mgr.complete_workout(&pool, start + Duration::minutes(45)).await?;

    assert_eq!(receipt.sets_logged, 2);
    assert_eq!(receipt.duration_seconds, 45 * 60);
    assert!(!mgr.has_active_workout());

    let (sessions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workout_sessions")
        .fetch_one(&pool)
        .await?;
    assert_eq!(sessions, 1);

    let rows: Vec<(i64, i64, f64)> = sqlx::query_as(
        "SELECT set_number, reps, weight_kg FROM set_logs ORDER BY set_number",
    )
    .fetch_all(&pool)
    .await?;
    assert_eq!(rows, vec![(1, 8, 100.0), (2, 7, 100.0)]);

    let (completed_at, duration): (Option<DateTime<Utc>>, i64) = sqlx::query_as(
        "SELECT completed_at, duration_seconds FROM workout_sessions WHERE id = ?",
    )
    .bind(&receipt.session_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(completed_at, Some(start + Duration::minutes(45)));
    assert_eq!(duration, 45 * 60);

    Ok(())
}

#[tokio::test]
async fn failed_commit_rolls_back_and_keeps_the_workout() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let start = Utc::now() - Duration::minutes(30);
    let mut mgr = SessionManager::new(None, 90);
    mgr.start_workout(
        None,
        "Freeform",
        vec![
            ActiveExercise::planned(bench.as_str(), "Bench Press", 1),
            // Not in the catalog; its set row violates the foreign key.
            ActiveExercise::planned("ghost", "Ghost Press", 1),
        ],
        start,
    )?;

    mgr.complete_set(&bench, 1, 8, 80.0, start + Duration::minutes(5))?;
    mgr.complete_set("ghost", 1, 8, 40.0, start + Duration::minutes(10))?;

    let result = mgr.complete_workout(&pool, start + Duration::minutes(30)).await;
    assert!(result.is_err(), "commit should fail on the ghost exercise");

    // Nothing landed, not even the session row or the valid set.
    let (sessions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workout_sessions")
        .fetch_one(&pool)
        .await?;
    let (sets,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM set_logs")
        .fetch_one(&pool)
        .await?;
    assert_eq!((sessions, sets), (0, 0));

    // The workout is still active; fixing the problem and retrying works.
    assert!(mgr.has_active_workout());
    mgr.remove_exercise("ghost")?;

    let receipt = mgr.complete_workout(&pool, start + Duration::minutes(31)).await?;
    assert_eq!(receipt.sets_logged, 1);
    assert!(!mgr.has_active_workout());

    Ok(())
}

#[tokio::test]
async fn abandoning_a_workout_writes_nothing() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let mut mgr = SessionManager::new(None, 90);
    mgr.start_workout(
        None,
        "Freeform",
        vec![ActiveExercise::planned(bench.as_str(), "Bench Press", 3)],
        Utc::now(),
    )?;
    mgr.complete_set(&bench, 1, 10, 60.0, Utc::now())?;

    let discarded = mgr.abandon_workout()?;
    assert_eq!(discarded.total_completed_sets(), 1);

    let (sessions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workout_sessions")
        .fetch_one(&pool)
        .await?;
    let (sets,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM set_logs")
        .fetch_one(&pool)
        .await?;
    assert_eq!((sessions, sets), (0, 0));

    Ok(())
}

#[tokio::test]
async fn finishing_without_sets_still_records_the_session() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let start = Utc::now() - Duration::minutes(10);
    let mut mgr = SessionManager::new(None, 90);
    mgr.start_workout(
        None,
        "Freeform",
        vec![ActiveExercise::planned(bench.as_str(), "Bench Press", 3)],
        start,
    )?;

    let receipt = mgr.complete_workout(&pool, start + Duration::minutes(10)).await?;
    assert_eq!(receipt.sets_logged, 0);

    let (sessions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workout_sessions")
        .fetch_one(&pool)
        .await?;
    let (sets,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM set_logs")
        .fetch_one(&pool)
        .await?;
    assert_eq!((sessions, sets), (1, 0));

    Ok(())
}
