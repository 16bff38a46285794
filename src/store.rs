use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use uuid::Uuid;

use crate::db::DB;
use crate::session::ActiveWorkout;

/// Which completed sessions a history read considers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScope {
    All,
    Template(String),
    Session(String),
}

/// What a committed workout looked like, for the parting summary.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutReceipt {
    pub session_id: String,
    pub duration_seconds: i64,
    pub sets_logged: usize,
}

/// One set from a completed session, joined to its session's
/// completion time and denormalized template name.
#[derive(Debug, Clone)]
pub struct ExerciseSetRow {
    pub exercise_id: String,
    pub session_id: String,
    pub template_name: String,
    pub completed_at: DateTime<Utc>,
    pub set_number: u32,
    pub reps: u32,
    pub weight_kg: f64,
}

/// An exercise tracked by some template, with its rep prescription.
#[derive(Debug, Clone)]
pub struct ExerciseTarget {
    pub exercise_id: String,
    pub exercise_name: String,
    pub rep_range_min: u32,
    pub rep_range_max: u32,
}

/// A template plus the completion instant of its most recent session.
#[derive(Debug, Clone)]
pub struct TemplateRecency {
    pub template_id: String,
    pub name: String,
    pub day_of_week: Option<u8>,
    pub last_completed: Option<DateTime<Utc>>,
}

/// Writes the finished workout in one transaction: the session row and
/// one row per completed set all land together or not at all.
pub async fn commit_workout(
    pool: &DB,
    workout: &ActiveWorkout,
    now: DateTime<Utc>,
) -> Result<WorkoutReceipt> {
    let session_id = Uuid::new_v4().to_string();
    let duration_seconds = workout.elapsed_seconds(now);

    let mut tx = pool.begin().await.context("Failed to open transaction")?;

    sqlx::query(
        r#"
        INSERT INTO workout_sessions
          (id, template_id, template_name, started_at, completed_at, duration_seconds)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&session_id)
    .bind(&workout.template_id)
    .bind(&workout.label)
    .bind(workout.started_at)
    .bind(now)
    .bind(duration_seconds)
    .execute(&mut *tx)
    .await
    .context("Failed to write session row")?;

    let mut sets_logged = 0usize;
    for exercise in &workout.exercises {
        for set in exercise.completed_sets() {
            let (reps, weight_kg) = match (set.reps, set.weight_kg) {
                (Some(r), Some(w)) => (r, w),
                _ => continue,
            };

            sqlx::query(
                r#"
                INSERT INTO set_logs
                  (id, session_id, exercise_id, set_number, reps, weight_kg, rest_seconds)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&session_id)
            .bind(&exercise.exercise_id)
            .bind(set.set_number as i64)
            .bind(reps as i64)
            .bind(weight_kg)
            .bind(set.rest_seconds.map(|r| r as i64))
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!("Failed to write set {} of `{}`", set.set_number, exercise.name)
            })?;

            sets_logged += 1;
        }
    }

    tx.commit().await.context("Failed to commit workout")?;

    Ok(WorkoutReceipt {
        session_id,
        duration_seconds,
        sets_logged,
    })
}

/// Exercises appearing in template exercise lists, in template
/// creation order then slot order, first occurrence winning when an
/// exercise shows up in several templates.
pub async fn tracked_exercises(pool: &DB, template_id: Option<&str>) -> Result<Vec<ExerciseTarget>> {
    let base = r#"
        SELECT te.exercise_id, e.name, te.rep_range_min, te.rep_range_max
        FROM template_exercises te
        JOIN exercises e ON e.id = te.exercise_id
        JOIN workout_templates wt ON wt.id = te.template_id
    "#;

    let rows: Vec<(String, String, i64, i64)> = if let Some(id) = template_id {
        let q = format!("{base} WHERE wt.id = ? ORDER BY wt.created_at, wt.rowid, te.position");
        sqlx::query_as(&q).bind(id).fetch_all(pool).await?
    } else {
        let q = format!("{base} ORDER BY wt.created_at, wt.rowid, te.position");
        sqlx::query_as(&q).fetch_all(pool).await?
    };

    Ok(rows
        .into_iter()
        .map(|(exercise_id, exercise_name, min, max)| ExerciseTarget {
            exercise_id,
            exercise_name,
            rep_range_min: min as u32,
            rep_range_max: max as u32,
        })
        .unique_by(|t| t.exercise_id.clone())
        .collect())
}

/// Set history for a batch of exercises, newest session first. Only
/// completed sessions count; an in-flight or abandoned session is
/// invisible here.
pub async fn completed_sets_for_exercises(
    pool: &DB,
    exercise_ids: &[String],
    scope: &HistoryScope,
) -> Result<Vec<ExerciseSetRow>> {
    if exercise_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; exercise_ids.len()].join(", ");
    let scope_filter = match scope {
        HistoryScope::All => "",
        HistoryScope::Template(_) => "AND ws.template_id = ?",
        HistoryScope::Session(_) => "AND ws.id = ?",
    };

    let q = format!(
        r#"
        SELECT sl.exercise_id, sl.session_id, ws.template_name, ws.completed_at,
               sl.set_number, sl.reps, sl.weight_kg
        FROM set_logs sl
        JOIN workout_sessions ws ON ws.id = sl.session_id
        WHERE ws.completed_at IS NOT NULL
          {scope_filter}
          AND sl.exercise_id IN ({placeholders})
        ORDER BY ws.completed_at DESC, ws.id, sl.set_number ASC
        "#
    );

    let mut query = sqlx::query_as::<_, (String, String, String, DateTime<Utc>, i64, i64, f64)>(&q);

    match scope {
        HistoryScope::All => {}
        HistoryScope::Template(id) | HistoryScope::Session(id) => {
            query = query.bind(id.clone());
        }
    }
    for id in exercise_ids {
        query = query.bind(id);
    }

    let rows = query.fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(
            |(exercise_id, session_id, template_name, completed_at, set_number, reps, weight_kg)| {
                ExerciseSetRow {
                    exercise_id,
                    session_id,
                    template_name,
                    completed_at,
                    set_number: set_number as u32,
                    reps: reps as u32,
                    weight_kg,
                }
            },
        )
        .collect())
}

/// Completion instants of every completed session, newest first.
pub async fn completed_session_instants(pool: &DB) -> Result<Vec<DateTime<Utc>>> {
    let rows: Vec<(DateTime<Utc>,)> = sqlx::query_as(
        r#"
        SELECT completed_at
        FROM workout_sessions
        WHERE completed_at IS NOT NULL
        ORDER BY completed_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(t,)| t).collect())
}

/// Every template with the completion time of its most recent session.
/// Creation order is the deterministic tie-break for suggestion picks.
pub async fn templates_with_recency(pool: &DB) -> Result<Vec<TemplateRecency>> {
    let rows: Vec<(String, String, Option<i64>, Option<DateTime<Utc>>)> = sqlx::query_as(
        r#"
        SELECT wt.id, wt.name, wt.day_of_week, MAX(ws.completed_at) AS last_completed
        FROM workout_templates wt
        LEFT JOIN workout_sessions ws
          ON ws.template_id = wt.id AND ws.completed_at IS NOT NULL
        GROUP BY wt.id
        ORDER BY wt.created_at, wt.rowid
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(template_id, name, day_of_week, last_completed)| TemplateRecency {
            template_id,
            name,
            day_of_week: day_of_week.map(|d| d as u8),
            last_completed,
        })
        .collect())
}
