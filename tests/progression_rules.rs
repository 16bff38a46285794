//! End-to-end progression analysis over seeded workout history.
//!
//! Tests cover:
//! - Report ordering and the stall / progress / maintain rules
//! - The ready-to-increase marker at the rep ceiling
//! - Template and session scopes, and freeform sessions
//! - Personal bests and their source workout

mod common;

use common::*;
use ironlog::progression::{self, TrendStatus};
use ironlog::store::HistoryScope;

#[tokio::test]
async fn report_classifies_and_sorts_tracked_exercises() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;
    let squat = seed_exercise(&pool, "Squat").await;
    let curl = seed_exercise(&pool, "Curl").await;

    let tpl = seed_template(&pool, "Full Body", None).await;
    seed_slot(&pool, &tpl, &bench, 1, 3, 8, 12).await;
    seed_slot(&pool, &tpl, &squat, 2, 3, 8, 12).await;
    seed_slot(&pool, &tpl, &curl, 3, 3, 8, 12).await;

    // Bench: three sessions at 80 kg with no rep gains.
    for n in [7, 4, 1] {
        seed_completed_session(
            &pool,
            Some(&tpl),
            "Full Body",
            days_ago(n),
            &[(&bench, 8, 80.0), (&bench, 8, 80.0), (&bench, 8, 80.0)],
        )
        .await;
    }

    // Squat: total reps up since the previous session.
    seed_completed_session(
        &pool,
        Some(&tpl),
        "Full Body",
        days_ago(5),
        &[(&squat, 9, 100.0), (&squat, 10, 100.0), (&squat, 10, 100.0)],
    )
    .await;
    seed_completed_session(
        &pool,
        Some(&tpl),
        "Full Body",
        days_ago(2),
        &[(&squat, 10, 100.0), (&squat, 10, 100.0), (&squat, 10, 100.0)],
    )
    .await;

    // Curl: never trained.

    let report = progression::analyze(&pool, &HistoryScope::All).await?;
    assert_eq!(report.len(), 3);

    // Stalled first, progressing next, maintaining last.
    assert_eq!(report[0].exercise_name, "Bench Press");
    assert_eq!(report[0].status, TrendStatus::Stalled);
    assert_eq!(report[0].sessions_at_current_weight, 3);
    assert_eq!(report[0].current_weight_kg, Some(80.0));
    assert!(!report[0].ready_to_increase);

    assert_eq!(report[1].exercise_name, "Squat");
    assert_eq!(report[1].status, TrendStatus::Progressing);
    assert_eq!(report[1].last_reps, vec![10, 10, 10]);
    assert_eq!(report[1].prev_reps, vec![9, 10, 10]);

    assert_eq!(report[2].exercise_name, "Curl");
    assert_eq!(report[2].status, TrendStatus::Maintaining);
    assert_eq!(report[2].current_weight_kg, None);
    assert_eq!(report[2].last_performed, None);

    Ok(())
}

#[tokio::test]
async fn rep_ceiling_marks_ready_to_increase() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let ohp = seed_exercise(&pool, "Overhead Press").await;
    let tpl = seed_template(&pool, "Push Day", None).await;
    seed_slot(&pool, &tpl, &ohp, 1, 3, 8, 12).await;

    seed_completed_session(
        &pool,
        Some(&tpl),
        "Push Day",
        days_ago(1),
        &[(&ohp, 12, 60.0), (&ohp, 12, 60.0), (&ohp, 13, 60.0)],
    )
    .await;

    let report = progression::analyze(&pool, &HistoryScope::All).await?;
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].status, TrendStatus::Progressing);
    assert!(report[0].ready_to_increase, "every set reached the rep ceiling");

    Ok(())
}

#[tokio::test]
async fn template_scope_sees_only_that_templates_sessions() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;

    let tpl_a = seed_template(&pool, "Push A", None).await;
    let tpl_b = seed_template(&pool, "Push B", None).await;
    seed_slot(&pool, &tpl_a, &bench, 1, 3, 8, 12).await;
    seed_slot(&pool, &tpl_b, &bench, 1, 3, 6, 10).await;

    seed_completed_session(
        &pool,
        Some(&tpl_b),
        "Push B",
        days_ago(2),
        &[(&bench, 8, 80.0), (&bench, 8, 80.0)],
    )
    .await;

    // Scoped to A: the bench has no history there.
    let report = progression::analyze(&pool, &HistoryScope::Template(tpl_a.clone())).await?;
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].current_weight_kg, None);

    // Scoped to B: the sessions are visible.
    let report = progression::analyze(&pool, &HistoryScope::Template(tpl_b.clone())).await?;
    assert_eq!(report[0].current_weight_kg, Some(80.0));

    // Unscoped: one entry per exercise, rep targets from the first
    // template that lists it.
    let report = progression::analyze(&pool, &HistoryScope::All).await?;
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].target_rep_max, 12);

    Ok(())
}

#[tokio::test]
async fn session_scope_pins_analysis_to_one_workout() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;
    let tpl = seed_template(&pool, "Push Day", None).await;
    seed_slot(&pool, &tpl, &bench, 1, 3, 8, 12).await;

    let old = seed_completed_session(
        &pool,
        Some(&tpl),
        "Push Day",
        days_ago(8),
        &[(&bench, 8, 100.0)],
    )
    .await;
    seed_completed_session(&pool, Some(&tpl), "Push Day", days_ago(1), &[(&bench, 8, 90.0)]).await;

    let report = progression::analyze(&pool, &HistoryScope::Session(old)).await?;
    assert_eq!(report[0].current_weight_kg, Some(100.0));
    assert_eq!(report[0].sessions_at_current_weight, 1);

    Ok(())
}

#[tokio::test]
async fn freeform_sessions_count_toward_progression() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;
    let tpl = seed_template(&pool, "Push Day", None).await;
    seed_slot(&pool, &tpl, &bench, 1, 3, 8, 12).await;

    // Logged outside any template, e.g. a drop-in workout.
    let yesterday = days_ago(1);
    seed_completed_session(&pool, None, "Freeform", yesterday, &[(&bench, 9, 85.0)]).await;

    let report = progression::analyze(&pool, &HistoryScope::All).await?;
    assert_eq!(report[0].current_weight_kg, Some(85.0));
    assert_eq!(report[0].last_performed, Some(yesterday));

    Ok(())
}

#[tokio::test]
async fn personal_best_keeps_its_source_workout() -> anyhow::Result<()> {
    let pool = test_pool().await;
    let bench = seed_exercise(&pool, "Bench Press").await;
    let tpl = seed_template(&pool, "Push Day", None).await;
    seed_slot(&pool, &tpl, &bench, 1, 3, 8, 12).await;

    seed_completed_session(
        &pool,
        Some(&tpl),
        "Heavy Day",
        days_ago(10),
        &[(&bench, 5, 105.0)],
    )
    .await;
    seed_completed_session(
        &pool,
        Some(&tpl),
        "Volume Day",
        days_ago(1),
        &[(&bench, 10, 90.0)],
    )
    .await;

    let report = progression::analyze(&pool, &HistoryScope::All).await?;
    assert_eq!(report[0].best_weight_kg, Some(105.0));
    assert_eq!(report[0].best_weight_source.as_deref(), Some("Heavy Day"));
    // The working weight still comes from the newest session.
    assert_eq!(report[0].current_weight_kg, Some(90.0));

    Ok(())
}
