use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::cli::ExerciseCmd;
use crate::models::ExerciseFile;
use crate::store::{self, HistoryScope};
use crate::types::{ALLOWED_MUSCLES, WEIGHT_EPSILON, best_muscle_suggestion, canonical_muscle};
use crate::{OutputFmt, emit};

#[derive(Serialize)]
struct ExJson {
    idx: i64,
    name: String,
    primary_muscle: String,
    description: String,
    created_at: String,
}

fn plain_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut count = 0;
    while i < bytes.len() {
        if bytes[i] == 0x1B {
            // Skip \x1b[... m
            while i < bytes.len() && bytes[i] != b'm' {
                i += 1;
            }

            i += 1; // Skip the 'm'
        } else {
            count += 1;
            i += 1;
        }
    }

    count
}

pub async fn handle(cmd: ExerciseCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    match cmd {
        ExerciseCmd::Add { name, muscle, desc } => {
            let Some(muscle) = validated_muscle(&muscle) else {
                return Ok(());
            };

            let res = sqlx::query(
                r#"
                INSERT INTO exercises
                  (id, name, primary_muscle, description, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&name)
            .bind(&muscle)
            .bind(desc.unwrap_or_default())
            .bind(Utc::now())
            .execute(pool)
            .await;

            match res {
                Ok(info) if info.rows_affected() == 1 => {
                    println!("{} exercise \"{}\" added", "ok:".green().bold(), &name)
                }
                Ok(_) => println!(
                    "{} exercise \"{}\" was not inserted",
                    "info:".blue().bold(),
                    &name
                ),
                Err(sqlx::Error::Database(db_err)) if db_err.code() == Some("2067".into()) => {
                    // 2067 = SQLITE_CONSTRAINT_UNIQUE
                    println!(
                        "{} exercise \"{}\" already exists – use `ex list` to view all exercises",
                        "warning:".yellow().bold(),
                        name
                    );
                }
                Err(e) => {
                    println!("{} {}", "error:".red().bold(), e.to_string().red());
                    return Err(e.into());
                }
            }
        }

        ExerciseCmd::Import { file } => {
            let path = Path::new(&file);
            let toml_str = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Could not read file: `{}`", file))?;

            let import: ExerciseFile = toml::from_str(&toml_str)
                .context("Failed to parse TOML: expected [[exercises]] entries")?;

            if import.exercises.is_empty() {
                println!(
                    "{}",
                    "warning: no [[exercises]] entries found".yellow().bold()
                );
                return Ok(());
            }

            let mut inserted = 0;
            let mut skipped = 0;
            let mut unknowns: BTreeSet<String> = BTreeSet::new();

            for ex in import.exercises {
                let muscle = match canonical_muscle(&ex.muscle) {
                    Some(m) => m,
                    None => {
                        // Did you mean?
                        if let Some(sug) = best_muscle_suggestion(&ex.muscle) {
                            println!(
                                "{} `{}` skipped – unknown muscle `{}` -- did you mean: `{}`?",
                                "warning:".yellow().bold(),
                                ex.name,
                                ex.muscle,
                                sug.green()
                            );
                        } else {
                            println!(
                                "{} `{}` skipped – unknown muscle `{}`",
                                "warning:".yellow().bold(),
                                ex.name,
                                ex.muscle
                            );
                        }

                        skipped += 1;
                        unknowns.insert(ex.muscle);
                        continue;
                    }
                };

                let res = sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO exercises
                      (id, name, primary_muscle, description, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&ex.name)
                .bind(&muscle)
                .bind(ex.description.unwrap_or_default())
                .bind(Utc::now())
                .execute(pool)
                .await
                .with_context(|| format!("DB error inserting `{}`", ex.name))?;

                if res.rows_affected() == 1 {
                    inserted += 1;
                    println!("{} `{}`", "ok:".green().bold(), ex.name);
                } else {
                    skipped += 1;
                    println!("{} `{}` (already exists)", "info:".blue().bold(), ex.name);
                }
            }

            println!(
                "\n{} {} inserted, {} skipped",
                "Summary:".cyan().bold(),
                inserted,
                skipped
            );

            if !unknowns.is_empty() {
                let allowed = ALLOWED_MUSCLES
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");

                let bad = unknowns.into_iter().collect::<Vec<_>>().join(", ");

                println!();
                println!("{} {}", "Unknown muscles:".yellow().bold(), bad);
                println!("{} {}", "Allowed muscles:".cyan().bold(), allowed);
            }
        }

        ExerciseCmd::List { muscle } => {
            let muscle = match muscle {
                Some(m) => match validated_muscle(&m) {
                    Some(m) => Some(m),
                    None => return Ok(()),
                },
                None => None,
            };

            // Number before filtering so the indices always line up
            // with what `ex show <idx>` resolves.
            let base = r#"
                SELECT idx, name, primary_muscle, description, created_at
                FROM (
                  SELECT ROW_NUMBER() OVER (ORDER BY name) AS idx,
                         name, primary_muscle,
                         COALESCE(description, '') AS description,
                         created_at
                  FROM exercises
                ) t
            "#;

            let rows: Vec<(i64, String, String, String, String)> = if let Some(m) = muscle {
                let q = format!("{base} WHERE t.primary_muscle = ? ORDER BY t.idx");
                sqlx::query_as(&q).bind(m).fetch_all(pool).await?
            } else {
                let q = format!("{base} ORDER BY t.idx");
                sqlx::query_as(&q).fetch_all(pool).await?
            };

            let json_rows: Vec<ExJson> = rows
                .into_iter()
                .map(|(idx, name, primary_muscle, description, created_at)| ExJson {
                    idx,
                    name,
                    primary_muscle,
                    description,
                    created_at,
                })
                .collect();

            emit(fmt, &json_rows, || {
                println!("{}", "Exercises:".cyan().bold());

                let idx_w = json_rows
                    .iter()
                    .map(|e| e.idx.to_string().len())
                    .max()
                    .unwrap_or(1);

                let mut left = Vec::<String>::new();
                let mut right = Vec::<String>::new();

                for ex in &json_rows {
                    let idx_col = format!("{:>width$}", ex.idx, width = idx_w).yellow();
                    let desc = if ex.description.is_empty() {
                        String::new()
                    } else {
                        format!("– {}", ex.description).dimmed().to_string()
                    };
                    left.push(format!(
                        " {} • {} ({}) {}",
                        idx_col,
                        ex.name.bold(),
                        ex.primary_muscle.yellow(),
                        desc
                    ));
                    right.push(
                        format!("added {}", &ex.created_at[..10])
                            .dimmed()
                            .to_string(),
                    );
                }

                let printable_pad = left.iter().map(|s| plain_len(s)).max().unwrap_or(0);

                for (l, r) in left.into_iter().zip(right) {
                    let extra_hidden = l.len() - plain_len(&l);
                    let total_pad = printable_pad + extra_hidden;
                    println!(
                        "{:<total_pad$} {} {}",
                        l,
                        "|".blue(),
                        r,
                        total_pad = total_pad
                    );
                }

                if json_rows.is_empty() {
                    println!("{}", "  (no exercises found)".dimmed());
                }
            });
        }

        ExerciseCmd::Show { exercise, graph } => {
            let Some((ex_id, ex_name)) = super::resolve_exercise(pool, &exercise).await? else {
                println!("{} no such exercise `{}`", "error:".red().bold(), exercise);
                return Ok(());
            };

            let (muscle, description): (String, String) = sqlx::query_as(
                "SELECT primary_muscle, COALESCE(description, '') FROM exercises WHERE id = ?",
            )
            .bind(&ex_id)
            .fetch_one(pool)
            .await?;

            let ids = vec![ex_id.clone()];
            let rows = store::completed_sets_for_exercises(pool, &ids, &HistoryScope::All).await?;

            // Top set per session, oldest first. Rows arrive newest first,
            // sorted by session within a timestamp, so one pass groups them.
            let mut history: Vec<(DateTime<Utc>, f64)> = Vec::new();
            let mut grouped = "";
            for row in &rows {
                if row.session_id != grouped {
                    grouped = &row.session_id;
                    history.push((row.completed_at, row.weight_kg));
                } else if let Some(point) = history.last_mut() {
                    point.1 = point.1.max(row.weight_kg);
                }
            }
            history.reverse();

            #[derive(Serialize)]
            struct ShowJson {
                name: String,
                primary_muscle: String,
                description: String,
                best_weight_kg: Option<f64>,
                sessions_logged: usize,
            }

            let best = rows
                .iter()
                .map(|r| r.weight_kg)
                .fold(None::<f64>, |acc, w| Some(acc.map_or(w, |a| a.max(w))));
            let session_count = rows
                .iter()
                .map(|r| r.session_id.as_str())
                .collect::<BTreeSet<_>>()
                .len();

            let payload = ShowJson {
                name: ex_name.clone(),
                primary_muscle: muscle,
                description,
                best_weight_kg: best,
                sessions_logged: session_count,
            };

            emit(fmt, &payload, || {
                println!(
                    "{} {} ({})",
                    "Exercise:".cyan().bold(),
                    payload.name.bold(),
                    payload.primary_muscle.yellow()
                );
                if !payload.description.is_empty() {
                    println!("{}", payload.description.dimmed());
                }

                if let Some(best) = payload.best_weight_kg {
                    println!(
                        "{} {:.1} kg over {} session(s)",
                        "Best:".cyan().bold(),
                        best,
                        payload.sessions_logged
                    );
                }

                // Last few sessions, newest first.
                let mut last_session = "";
                let mut shown = 0;
                for row in &rows {
                    if row.session_id != last_session {
                        if shown == 3 {
                            break;
                        }
                        shown += 1;
                        last_session = &row.session_id;
                        println!(
                            "\n{} {} ({})",
                            "•".yellow(),
                            row.template_name.bold(),
                            row.completed_at
                                .with_timezone(&Local)
                                .format("%d-%m-%Y")
                                .to_string()
                                .dimmed()
                        );
                    }
                    println!("    set {}: {:.1} kg x {}", row.set_number, row.weight_kg, row.reps);
                }

                if rows.is_empty() {
                    println!("{}", "  (never performed)".dimmed());
                }

                if graph && !rows.is_empty() {
                    let (term_width, term_height) = term_size::dimensions().unwrap_or((80, 24));
                    let width = (term_width / 2).clamp(24, 60);
                    let height = (term_height / 2).clamp(6, 15);

                    println!("\n{}", "Weight history (kg):".cyan().bold());
                    for line in weight_graph(&history, width, height) {
                        println!("{}", line);
                    }
                }
            });
        }

        ExerciseCmd::Delete { exercise } => {
            let Some((ex_id, ex_name)) = super::resolve_exercise(pool, &exercise).await? else {
                println!("{} no such exercise `{}`", "error:".red().bold(), exercise);
                return Ok(());
            };

            let res = sqlx::query("DELETE FROM exercises WHERE id = ?")
                .bind(&ex_id)
                .execute(pool)
                .await;

            match res {
                Ok(_) => println!("{} deleted `{}`", "ok:".green().bold(), ex_name),
                Err(sqlx::Error::Database(db_err)) if db_err.code() == Some("787".into()) => {
                    // 787 = SQLITE_CONSTRAINT_FOREIGNKEY
                    println!(
                        "{} `{}` has logged history and cannot be deleted",
                        "warning:".yellow().bold(),
                        ex_name
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

/// Plots per-session top-set weights on a character grid, oldest
/// session on the left. Returns the rendered lines, y-axis labels and
/// date range included.
fn weight_graph(points: &[(DateTime<Utc>, f64)], width: usize, height: usize) -> Vec<String> {
    if points.len() < 2 {
        return vec![
            "  (need at least two sessions to graph)"
                .dimmed()
                .to_string(),
        ];
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (_, w) in points {
        min = min.min(*w);
        max = max.max(*w);
    }

    if max - min < WEIGHT_EPSILON {
        return vec![
            format!("  (every session at {:.1} kg)", max)
                .dimmed()
                .to_string(),
        ];
    }

    let range = max - min;
    let mut grid = vec![vec![' '; width]; height];

    let cell = |i: usize, weight: f64| -> (usize, usize) {
        let x = (i as f64 / (points.len() - 1) as f64 * (width - 1) as f64) as usize;
        let y = ((weight - min) / range * (height - 1) as f64) as usize;
        (x, height - 1 - y)
    };

    for (i, (_, weight)) in points.iter().enumerate() {
        let (x, y) = cell(i, *weight);
        grid[y][x] = '●';

        // Fill the segment back to the previous session with dots.
        if i > 0 {
            let (px, py) = cell(i - 1, points[i - 1].1);
            let dx = x as isize - px as isize;
            let dy = y as isize - py as isize;
            let steps = dx.abs().max(dy.abs());

            for step in 1..steps {
                let ix = px as isize + dx * step / steps;
                let iy = py as isize + dy * step / steps;
                if (0..width as isize).contains(&ix) && (0..height as isize).contains(&iy) {
                    let (ix, iy) = (ix as usize, iy as usize);
                    if grid[iy][ix] == ' ' {
                        grid[iy][ix] = '·';
                    }
                }
            }
        }
    }

    let mut lines = Vec::with_capacity(height + 2);
    let step = range / (height - 1) as f64;
    for (i, row) in grid.iter().enumerate() {
        let label = min + step * (height - 1 - i) as f64;
        lines.push(format!("{:6.1} │{}", label, row.iter().collect::<String>()));
    }
    lines.push(format!("       └{}", "─".repeat(width)));

    let first = points[0].0.with_timezone(&Local).format("%d-%m-%Y");
    let last = points[points.len() - 1].0.with_timezone(&Local).format("%d-%m-%Y");
    lines.push(format!("        {}  {}", first, last));

    lines
}

fn validated_muscle(input: &str) -> Option<String> {
    match canonical_muscle(input) {
        Some(m) => Some(m),
        None => {
            if let Some(sug) = best_muscle_suggestion(input) {
                println!(
                    "{} unknown muscle `{}` -- did you mean: `{}`?",
                    "error:".red().bold(),
                    input,
                    sug.green()
                );
            } else {
                let allowed = ALLOWED_MUSCLES
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "{} unknown muscle `{}` (allowed: {})",
                    "error:".red().bold(),
                    input,
                    allowed
                );
            }
            None
        }
    }
}
