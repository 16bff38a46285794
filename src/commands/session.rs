use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use colored::Colorize;
use serde::Serialize;
use sqlx::SqlitePool;
use std::io::Write as _;

use crate::cli::{RestCmd, SessionCmd, StartArgs};
use crate::session::{ActiveExercise, ActiveWorkout, ExerciseSettings, RestPoll, SessionManager};
use crate::storage::{self, Config};
use crate::types::WeightUnit;
use crate::utils::{format_countdown, format_duration};
use crate::{OutputFmt, emit};

#[derive(Serialize)]
struct ShowJson<'a> {
    workout: &'a ActiveWorkout,
    elapsed_seconds: i64,
    rest_seconds: u32,
}

#[derive(Serialize)]
struct HistoryRow {
    idx: usize,
    id: String,
    name: String,
    completed_at: String,
    duration_seconds: i64,
    sets: i64,
}

pub async fn handle(cmd: SessionCmd, pool: &SqlitePool, config: &Config, fmt: OutputFmt) -> Result<()> {
    let now = Utc::now();
    let mut mgr = SessionManager::new(storage::load_active_workout()?, config.default_rest_seconds());

    // The process was likely suspended since the last invocation.
    // Recompute the rest state from the clock before doing anything,
    // so an expired countdown is announced exactly once.
    if announce_finished_rest(&mut mgr, now)? && fmt == OutputFmt::Text {
        println!("{} rest finished \x07", "info:".blue().bold());
    }

    match cmd {
        SessionCmd::Start(args) => start(args, pool, &mut mgr, now, fmt).await?,

        SessionCmd::Show => {
            let Some(workout) = mgr.active() else {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            };

            let payload = ShowJson {
                workout,
                elapsed_seconds: workout.elapsed_seconds(now),
                rest_seconds: workout.rest_seconds(now),
            };

            emit(fmt, &payload, || render_workout(workout, config, now));
        }

        SessionCmd::Watch => {
            if !mgr.has_active_workout() {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            }

            watch(&mut mgr).await?;
        }

        SessionCmd::Log { exercise, reps, weight, set, unit } => {
            let Some(workout) = mgr.active() else {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            };

            let Some(exercise_id) = find_workout_exercise(workout, &exercise) else {
                return Ok(());
            };

            // "bw" logs a bodyweight set as zero added load.
            let entered: f64 = if weight.eq_ignore_ascii_case("bw") {
                0.0
            } else {
                match weight.parse() {
                    Ok(w) => w,
                    Err(_) => {
                        println!("{} invalid weight `{}`", "error:".red().bold(), weight);
                        return Ok(());
                    }
                }
            };

            let entry_unit = unit.unwrap_or_else(|| effective_unit(workout, &exercise_id, config));
            let weight_kg = entry_unit.to_kg(entered);

            // Default to the first pending set; append one when every
            // planned set is already done.
            let target_set = match set {
                Some(n) => n,
                None => {
                    let pending = mgr
                        .active()
                        .and_then(|w| w.exercise(&exercise_id))
                        .and_then(|e| e.sets.iter().find(|s| !s.completed))
                        .map(|s| s.set_number);

                    match pending {
                        Some(n) => n,
                        None => {
                            let n = match mgr.add_set(&exercise_id) {
                                Ok(n) => n,
                                Err(e) => {
                                    println!("{} {}", "error:".red().bold(), e);
                                    return Ok(());
                                }
                            };
                            println!("{} appended set {}", "note:".blue().bold(), n);
                            n
                        }
                    }
                }
            };

            match mgr.complete_set(&exercise_id, target_set, reps, weight_kg, now) {
                Ok(rest) => {
                    persist(&mgr)?;
                    let shown = entry_unit.format_kg(weight_kg);
                    println!(
                        "{} set {} logged: {} x {} – resting {}",
                        "ok:".green().bold(),
                        target_set,
                        shown.bold(),
                        reps,
                        format_countdown(rest)
                    );
                }
                Err(e) => {
                    // The earlier auto-append may still be worth keeping.
                    persist(&mgr)?;
                    println!("{} {}", "error:".red().bold(), e);
                }
            }
        }

        SessionCmd::AddEx { exercise, sets } => {
            if !mgr.has_active_workout() {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            }

            let Some((ex_id, ex_name)) = super::resolve_exercise(pool, &exercise).await? else {
                not_in_catalog(pool, &exercise).await?;
                return Ok(());
            };

            if let Err(e) = mgr.add_exercise(ex_id.as_str(), ex_name.as_str(), sets) {
                println!("{} {}", "error:".red().bold(), e);
                return Ok(());
            }

            persist(&mgr)?;
            println!(
                "{} added {} with {} sets",
                "ok:".green().bold(),
                ex_name.bold(),
                sets
            );
        }

        SessionCmd::RmEx { exercise } => {
            let Some(workout) = mgr.active() else {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            };

            let Some(exercise_id) = find_workout_exercise(workout, &exercise) else {
                return Ok(());
            };

            match mgr.remove_exercise(&exercise_id) {
                Ok(removed) => {
                    persist(&mgr)?;
                    let done = removed.completed_sets().count();
                    if done > 0 {
                        println!(
                            "{} removed {} – discarded {} completed set(s)",
                            "warning:".yellow().bold(),
                            removed.name.bold(),
                            done
                        );
                    } else {
                        println!("{} removed {}", "ok:".green().bold(), removed.name.bold());
                    }
                }
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }

        SessionCmd::AddSet { exercise } => {
            let Some(workout) = mgr.active() else {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            };

            let Some(exercise_id) = find_workout_exercise(workout, &exercise) else {
                return Ok(());
            };

            match mgr.add_set(&exercise_id) {
                Ok(n) => {
                    persist(&mgr)?;
                    println!("{} set {} added", "ok:".green().bold(), n);
                }
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }

        SessionCmd::RmSet { exercise, set } => {
            let Some(workout) = mgr.active() else {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            };

            let Some(exercise_id) = find_workout_exercise(workout, &exercise) else {
                return Ok(());
            };

            match mgr.remove_set(&exercise_id, set) {
                Ok(()) => {
                    persist(&mgr)?;
                    println!("{} set {} removed, remaining sets renumbered", "ok:".green().bold(), set);
                }
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }

        SessionCmd::Override { exercise, rest, unit, clear } => {
            let Some(workout) = mgr.active() else {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            };

            let Some(exercise_id) = find_workout_exercise(workout, &exercise) else {
                return Ok(());
            };

            let settings = if clear {
                ExerciseSettings::default()
            } else {
                let mut current = workout
                    .exercise(&exercise_id)
                    .map(|e| e.settings)
                    .unwrap_or_default();
                if let Some(r) = rest {
                    current.rest_seconds_override = Some(r);
                }
                if let Some(u) = unit {
                    current.weight_unit_override = Some(u);
                }
                current
            };

            match mgr.set_exercise_settings(&exercise_id, settings) {
                Ok(()) => {
                    persist(&mgr)?;
                    let rest_str = settings
                        .rest_seconds_override
                        .map(|r| format!("{r}s"))
                        .unwrap_or_else(|| "default".into());
                    let unit_str = settings
                        .weight_unit_override
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| "default".into());
                    println!(
                        "{} rest = {}, unit = {}",
                        "ok:".green().bold(),
                        rest_str,
                        unit_str
                    );
                }
                Err(e) => println!("{} {}", "error:".red().bold(), e),
            }
        }

        SessionCmd::Rest(rest_cmd) => {
            if !mgr.has_active_workout() {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            }

            match rest_cmd {
                RestCmd::Start { seconds } => {
                    let secs = seconds.unwrap_or_else(|| config.default_rest_seconds());
                    if let Err(e) = mgr.start_rest_timer(secs, now) {
                        println!("{} {}", "error:".red().bold(), e);
                        return Ok(());
                    }
                    persist(&mgr)?;
                    println!("{} resting {}", "ok:".green().bold(), format_countdown(secs));
                }

                RestCmd::Add { seconds } => match mgr.extend_rest_timer(seconds, now) {
                    Ok(remaining) => {
                        persist(&mgr)?;
                        println!(
                            "{} rest extended – {} left",
                            "ok:".green().bold(),
                            format_countdown(remaining)
                        );
                    }
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                },

                RestCmd::Skip => {
                    if let Err(e) = mgr.dismiss_rest_timer() {
                        println!("{} {}", "error:".red().bold(), e);
                        return Ok(());
                    }
                    persist(&mgr)?;
                    println!("{} rest dismissed", "ok:".green().bold());
                }

                RestCmd::Show => {
                    let remaining = mgr.active().map(|w| w.rest_seconds(now)).unwrap_or(0);
                    if remaining > 0 {
                        println!("{} {}", "Rest:".cyan().bold(), format_countdown(remaining));
                    } else {
                        println!("{}", "(no rest running)".dimmed());
                    }
                }
            }
        }

        SessionCmd::Finish => {
            if !mgr.has_active_workout() {
                println!("{} no workout in progress", "warning:".yellow().bold());
                return Ok(());
            }

            // On storage failure the workout stays active and the
            // scratch file is untouched; the command can be re-run.
            let receipt = mgr.complete_workout(pool, now).await?;
            // The session is already durably committed; a failure to
            // unlink the scratch file must not fail the command, or a
            // re-run would insert a duplicate session.
            if let Err(e) = storage::clear_active_workout() {
                println!(
                    "{} saved, but could not clear the active-workout file: {}",
                    "warning:".yellow().bold(),
                    e
                );
            }

            emit(fmt, &receipt, || {
                println!(
                    "{} workout saved – {} set(s) in {} (id: {})",
                    "ok:".green().bold(),
                    receipt.sets_logged,
                    format_duration(receipt.duration_seconds),
                    receipt.session_id
                );
            });
        }

        SessionCmd::Abandon => match mgr.abandon_workout() {
            Ok(discarded) => {
                storage::clear_active_workout()?;
                println!(
                    "{} abandoned `{}` after {} – {} completed set(s) discarded",
                    "warning:".yellow().bold(),
                    discarded.label,
                    format_duration(discarded.elapsed_seconds(now)),
                    discarded.total_completed_sets()
                );
            }
            Err(e) => println!("{} {}", "error:".red().bold(), e),
        },

        SessionCmd::History { date, limit } => match date {
            Some(date) => show_day(pool, &date, config, fmt).await?,
            None => list_history(pool, limit, fmt).await?,
        },
    }

    Ok(())
}

/// Polls the rest countdown and persists the `Resting -> Idle`
/// transition, so the finish fires once across invocations.
fn announce_finished_rest(mgr: &mut SessionManager, now: DateTime<Utc>) -> Result<bool> {
    let Ok(workout) = mgr.active_mut() else {
        return Ok(false);
    };

    if workout.poll_rest(now) == RestPoll::Finished {
        let snapshot = workout.clone();
        storage::save_active_workout(&snapshot)?;
        return Ok(true);
    }

    Ok(false)
}

fn persist(mgr: &SessionManager) -> Result<()> {
    match mgr.active() {
        Some(workout) => storage::save_active_workout(workout),
        None => storage::clear_active_workout(),
    }
}

async fn start(
    args: StartArgs,
    pool: &SqlitePool,
    mgr: &mut SessionManager,
    now: DateTime<Utc>,
    fmt: OutputFmt,
) -> Result<()> {
    if let Some(active) = mgr.active() {
        println!(
            "{} a workout is already in progress (`{}`, started {})",
            "error:".red().bold(),
            active.label,
            active.started_at.with_timezone(&Local).format("%H:%M")
        );
        println!(
            "{} finish it with `session finish` or drop it with `session abandon`",
            "note:".blue().bold()
        );
        return Ok(());
    }

    let (template_id, label, exercises) = match &args.template {
        Some(key) => {
            let Some((tpl_id, tpl_name)) = super::resolve_template(pool, key).await? else {
                println!("{} no template `{}`", "error:".red().bold(), key);
                return Ok(());
            };

            let slots = sqlx::query_as::<_, (String, String, i64, i64, i64)>(
                r#"
                SELECT te.exercise_id, e.name, te.target_sets, te.rep_range_min, te.rep_range_max
                FROM template_exercises te
                JOIN exercises e ON e.id = te.exercise_id
                WHERE te.template_id = ?
                ORDER BY te.position
                "#,
            )
            .bind(&tpl_id)
            .fetch_all(pool)
            .await?;

            let exercises: Vec<ActiveExercise> = slots
                .iter()
                .map(|(ex_id, name, sets, _, _)| {
                    ActiveExercise::planned(ex_id.as_str(), name.as_str(), *sets as u32)
                })
                .collect();

            if fmt == OutputFmt::Text && !slots.is_empty() {
                println!("{}", "Exercises:".cyan().bold());
                for (i, (_, name, sets, min, max)) in slots.iter().enumerate() {
                    let idx = format!("{}", i + 1).yellow();
                    let reps = if min == max {
                        format!("{max}")
                    } else {
                        format!("{min}-{max}")
                    };
                    println!("{} • {} – {} sets x {} reps", idx, name.bold(), sets, reps);
                }
            }

            (Some(tpl_id), tpl_name, exercises)
        }
        None => {
            let label = args.label.clone().unwrap_or_else(|| "Freeform".to_string());
            (None, label, Vec::new())
        }
    };

    match mgr.start_workout(template_id, label.as_str(), exercises, now) {
        Ok(workout) => {
            let snapshot = workout.clone();
            storage::save_active_workout(&snapshot)?;
            println!("\n{} `{}` started", "ok:".green().bold(), label.bold());
        }
        Err(e) => println!("{} {}", "error:".red().bold(), e),
    }

    Ok(())
}

/// Re-renders the timers once per second. The tick only repaints;
/// every value is recomputed from the clock.
async fn watch(mgr: &mut SessionManager) -> Result<()> {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
    let (term_width, _) = term_size::dimensions().unwrap_or((80, 24));

    loop {
        ticker.tick().await;
        let now = Utc::now();

        let Ok(workout) = mgr.active_mut() else {
            return Ok(());
        };

        let elapsed = workout.elapsed_seconds(now);
        let mut line = match workout.poll_rest(now) {
            RestPoll::Idle => format!(
                "[{}] elapsed {}",
                workout.label,
                format_duration(elapsed)
            ),
            RestPoll::Running { remaining } => format!(
                "[{}] elapsed {} | rest {}",
                workout.label,
                format_duration(elapsed),
                format_countdown(remaining)
            ),
            RestPoll::Finished => {
                let snapshot = workout.clone();
                storage::save_active_workout(&snapshot)?;
                format!(
                    "[{}] elapsed {} | rest finished \x07",
                    workout.label,
                    format_duration(elapsed)
                )
            }
        };

        if line.chars().count() > term_width {
            line = line.chars().take(term_width).collect();
        }

        print!("\r\x1b[2K{line}");
        std::io::stdout().flush()?;
    }
}

fn effective_unit(workout: &ActiveWorkout, exercise_id: &str, config: &Config) -> WeightUnit {
    workout
        .exercise(exercise_id)
        .and_then(|e| e.settings.weight_unit_override)
        .unwrap_or_else(|| config.weight_unit())
}

/// Finds an exercise of the active workout by 1-based index or name.
fn find_workout_exercise(workout: &ActiveWorkout, key: &str) -> Option<String> {
    if let Ok(idx) = key.parse::<usize>() {
        match idx.checked_sub(1).and_then(|i| workout.exercises.get(i)) {
            Some(e) => return Some(e.exercise_id.clone()),
            None => {
                println!(
                    "{} no exercise at index {} (workout has {})",
                    "error:".red().bold(),
                    idx,
                    workout.exercises.len()
                );
                return None;
            }
        }
    }

    if let Some(e) = workout
        .exercises
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(key))
    {
        return Some(e.exercise_id.clone());
    }

    let names: Vec<&str> = workout.exercises.iter().map(|e| e.name.as_str()).collect();
    match crate::types::best_suggestion(key, names) {
        Some(sug) => println!(
            "{} no exercise `{}` in this workout -- did you mean: `{}`?",
            "error:".red().bold(),
            key,
            sug.green()
        ),
        None => println!(
            "{} no exercise `{}` in this workout",
            "error:".red().bold(),
            key
        ),
    }

    None
}

async fn not_in_catalog(pool: &SqlitePool, key: &str) -> Result<()> {
    let names = super::exercise_names(pool).await?;
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    match crate::types::best_suggestion(key, names) {
        Some(sug) => println!(
            "{} no exercise `{}` -- did you mean: `{}`?",
            "error:".red().bold(),
            key,
            sug.green()
        ),
        None => println!("{} no exercise `{}`", "error:".red().bold(), key),
    }
    Ok(())
}

fn render_workout(workout: &ActiveWorkout, config: &Config, now: DateTime<Utc>) {
    println!("{} {}", "Workout:".cyan().bold(), workout.label.bold());
    println!(
        "{} {} ({})",
        "Started:".cyan().bold(),
        workout.started_at.with_timezone(&Local).format("%H:%M"),
        format_duration(workout.elapsed_seconds(now))
    );

    let rest = workout.rest_seconds(now);
    if rest > 0 {
        println!("{} {}", "Rest:".cyan().bold(), format_countdown(rest));
    }

    for (i, exercise) in workout.exercises.iter().enumerate() {
        let unit = exercise
            .settings
            .weight_unit_override
            .unwrap_or_else(|| config.weight_unit());

        let idx = format!("{}", i + 1).yellow();
        let override_note = exercise
            .settings
            .rest_seconds_override
            .map(|r| format!(" (rest {r}s)").dimmed().to_string())
            .unwrap_or_default();
        println!("\n{} • {}{}", idx, exercise.name.bold(), override_note);

        for set in &exercise.sets {
            if set.completed {
                let weight = set.weight_kg.map(|w| unit.format_kg(w)).unwrap_or_default();
                let reps = set.reps.unwrap_or(0);
                println!(
                    "   {} set {}: {} x {}",
                    "✓".green(),
                    set.set_number,
                    weight.bold(),
                    reps
                );
            } else {
                println!("   {} set {}: pending", "·".dimmed(), set.set_number);
            }
        }

        if exercise.sets.is_empty() {
            println!("   {}", "(no sets planned)".dimmed());
        }
    }

    if workout.exercises.is_empty() {
        println!("\n{}", "(no exercises yet – `session add-ex`)".dimmed());
    }
}

async fn list_history(pool: &SqlitePool, limit: u32, fmt: OutputFmt) -> Result<()> {
    let rows: Vec<(String, String, DateTime<Utc>, Option<i64>, i64)> = sqlx::query_as(
        r#"
        SELECT ws.id, ws.template_name, ws.completed_at, ws.duration_seconds, COUNT(sl.id)
        FROM workout_sessions ws
        LEFT JOIN set_logs sl ON sl.session_id = ws.id
        WHERE ws.completed_at IS NOT NULL
        GROUP BY ws.id
        ORDER BY ws.completed_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let json_rows: Vec<HistoryRow> = rows
        .iter()
        .enumerate()
        .map(|(i, (id, name, completed_at, duration, sets))| HistoryRow {
            idx: i + 1,
            id: id.clone(),
            name: name.clone(),
            completed_at: completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            duration_seconds: duration.unwrap_or(0),
            sets: *sets,
        })
        .collect();

    emit(fmt, &json_rows, || {
        if json_rows.is_empty() {
            println!("{}", "(no completed sessions)".dimmed());
            return;
        }

        println!("{}", "Sessions:".cyan().bold());
        for row in &json_rows {
            let idx = format!("{}", row.idx).yellow();
            println!(
                "{} • {} – {} ({}, {} sets)",
                idx,
                row.name.bold(),
                row.completed_at.dimmed(),
                format_duration(row.duration_seconds),
                row.sets
            );
        }
    });

    Ok(())
}

async fn show_day(pool: &SqlitePool, date: &str, config: &Config, fmt: OutputFmt) -> Result<()> {
    let Ok(day) = NaiveDate::parse_from_str(date, "%d-%m-%Y") else {
        println!(
            "{} invalid date `{}` (expected DD-MM-YYYY)",
            "error:".red().bold(),
            date
        );
        return Ok(());
    };

    // Sessions are stored with UTC instants; the requested day is a
    // local calendar day.
    let sessions: Vec<(String, String, DateTime<Utc>, Option<i64>)> = sqlx::query_as(
        r#"
        SELECT id, template_name, completed_at, duration_seconds
        FROM workout_sessions
        WHERE completed_at IS NOT NULL
        ORDER BY completed_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let sessions: Vec<_> = sessions
        .into_iter()
        .filter(|(_, _, completed_at, _)| completed_at.with_timezone(&Local).date_naive() == day)
        .collect();

    if sessions.is_empty() {
        println!(
            "{} no completed session on {}",
            "warning:".yellow().bold(),
            day.format("%d-%m-%Y")
        );
        return Ok(());
    }

    let unit = config.weight_unit();

    #[derive(Serialize)]
    struct DayJson {
        id: String,
        name: String,
        completed_at: DateTime<Utc>,
        duration_seconds: i64,
        sets: Vec<DaySet>,
    }

    #[derive(Serialize)]
    struct DaySet {
        exercise: String,
        set_number: i64,
        reps: i64,
        weight_kg: f64,
        rest_seconds: Option<i64>,
    }

    let mut payload = Vec::new();
    for (id, name, completed_at, duration) in &sessions {
        let sets: Vec<(String, i64, i64, f64, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT e.name, sl.set_number, sl.reps, sl.weight_kg, sl.rest_seconds
            FROM set_logs sl
            JOIN exercises e ON e.id = sl.exercise_id
            WHERE sl.session_id = ?
            ORDER BY sl.rowid
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        payload.push(DayJson {
            id: id.clone(),
            name: name.clone(),
            completed_at: *completed_at,
            duration_seconds: duration.unwrap_or(0),
            sets: sets
                .into_iter()
                .map(|(exercise, set_number, reps, weight_kg, rest_seconds)| DaySet {
                    exercise,
                    set_number,
                    reps,
                    weight_kg,
                    rest_seconds,
                })
                .collect(),
        });
    }

    emit(fmt, &payload, || {
        for session in &payload {
            println!(
                "{} {} – {} ({})",
                "Session:".cyan().bold(),
                session.name.bold(),
                session
                    .completed_at
                    .with_timezone(&Local)
                    .format("%d-%m-%Y %H:%M"),
                format_duration(session.duration_seconds)
            );

            let mut last_exercise = "";
            for set in &session.sets {
                if set.exercise != last_exercise {
                    println!("  {}", set.exercise.bold());
                    last_exercise = &set.exercise;
                }
                println!(
                    "    set {}: {} x {}",
                    set.set_number,
                    unit.format_kg(set.weight_kg).bold(),
                    set.reps
                );
            }

            println!();
        }
    });

    Ok(())
}
