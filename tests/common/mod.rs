use std::collections::HashMap;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use ironlog::db::{self, DB};
use uuid::Uuid;

/// Fresh in-memory database with the schema applied.
pub async fn test_pool() -> DB {
    db::open_in_memory()
        .await
        .expect("Failed to open in-memory database")
}

/// Inserts a catalog exercise, returning its id.
pub async fn seed_exercise(pool: &DB, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO exercises (id, name, primary_muscle, description, created_at)
         VALUES (?, ?, 'chest', '', ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("Failed to seed exercise");
    id
}

/// Inserts a workout template, returning its id. Successive calls get
/// increasing creation times, so list order follows call order.
pub async fn seed_template(pool: &DB, name: &str, day_of_week: Option<u8>) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO workout_templates (id, split_id, name, day_of_week, position, created_at)
         VALUES (?, NULL, ?, ?, 0, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(day_of_week.map(|d| d as i64))
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("Failed to seed template");
    id
}

/// Adds an exercise slot to a template's exercise list.
pub async fn seed_slot(
    pool: &DB,
    template_id: &str,
    exercise_id: &str,
    position: u32,
    target_sets: u32,
    rep_min: u32,
    rep_max: u32,
) {
    sqlx::query(
        "INSERT INTO template_exercises
           (id, template_id, exercise_id, position, target_sets, rep_range_min, rep_range_max)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(template_id)
    .bind(exercise_id)
    .bind(position as i64)
    .bind(target_sets as i64)
    .bind(rep_min as i64)
    .bind(rep_max as i64)
    .execute(pool)
    .await
    .expect("Failed to seed template exercise");
}

/// Inserts a completed session plus one set row per `(exercise_id,
/// reps, weight_kg)` entry. Sets of the same exercise are numbered in
/// the order given. Returns the session id.
pub async fn seed_completed_session(
    pool: &DB,
    template_id: Option<&str>,
    template_name: &str,
    completed_at: DateTime<Utc>,
    sets: &[(&str, u32, f64)],
) -> String {
    let session_id = Uuid::new_v4().to_string();
    let started_at = completed_at - Duration::minutes(45);

    sqlx::query(
        "INSERT INTO workout_sessions
           (id, template_id, template_name, started_at, completed_at, duration_seconds)
         VALUES (?, ?, ?, ?, ?, 2700)",
    )
    .bind(&session_id)
    .bind(template_id)
    .bind(template_name)
    .bind(started_at)
    .bind(completed_at)
    .execute(pool)
    .await
    .expect("Failed to seed session");

    let mut counters: HashMap<&str, u32> = HashMap::new();
    for (exercise_id, reps, weight_kg) in sets {
        let number = counters.entry(exercise_id).or_insert(0);
        *number += 1;

        sqlx::query(
            "INSERT INTO set_logs
               (id, session_id, exercise_id, set_number, reps, weight_kg, rest_seconds)
             VALUES (?, ?, ?, ?, ?, ?, 90)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&session_id)
        .bind(exercise_id)
        .bind(*number as i64)
        .bind(*reps as i64)
        .bind(weight_kg)
        .execute(pool)
        .await
        .expect("Failed to seed set log");
    }

    session_id
}

/// Noon in the local timezone, a DST-safe instant within `date`.
pub fn local_noon(date: NaiveDate) -> DateTime<Utc> {
    let noon = date.and_hms_opt(12, 0, 0).expect("valid time of day");
    Local
        .from_local_datetime(&noon)
        .single()
        .expect("unambiguous local noon")
        .with_timezone(&Utc)
}

/// Local noon `n` days before today.
pub fn days_ago(n: i64) -> DateTime<Utc> {
    local_noon(Local::now().date_naive() - Duration::days(n))
}
