use std::collections::HashSet;
use std::fs::read_to_string;

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::cli::TemplateCmd;
use crate::models::{SplitFile, TemplateDef, TemplateFile};
use crate::types::{day_name, parse_day_of_week, parse_rep_range};
use crate::{OutputFmt, emit};

#[derive(Serialize)]
struct TplJson {
    idx: i64,
    name: String,
    split: String,
    day: Option<String>,
    exercises: i64,
    created_at: String,
}

fn plain_len(s: &str) -> usize {
    let mut n = 0;
    let mut esc = false;
    for b in s.bytes() {
        match (esc, b) {
            (true, b'm') => esc = false,
            (true, _) => {}
            (false, 0x1B) => esc = true,
            (false, _) => n += 1,
        }
    }
    n
}

pub async fn handle(cmd: TemplateCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    match cmd {
        TemplateCmd::Import { files } => {
            if files.is_empty() {
                println!("{} no template file provided", "warning:".yellow().bold());
            }
            for f in files {
                match import_split_file(pool, &f).await {
                    Ok(()) => {}
                    Err(e) => {
                        if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
                            if io_err.kind() == std::io::ErrorKind::NotFound {
                                println!(
                                    "{} cannot open file `{}` – file not found",
                                    "error:".red().bold(),
                                    f
                                );
                                continue;
                            }
                        }

                        return Err(e);
                    }
                }
            }
        }

        TemplateCmd::List => {
            let rows: Vec<(i64, String, Option<i64>, String, i64, String)> = sqlx::query_as(
                r#"
                SELECT ROW_NUMBER() OVER (ORDER BY wt.created_at, wt.rowid) AS idx,
                       wt.name,
                       wt.day_of_week,
                       COALESCE(s.name, '') AS split_name,
                       (SELECT COUNT(*) FROM template_exercises te WHERE te.template_id = wt.id) AS exercises,
                       wt.created_at
                FROM workout_templates wt
                LEFT JOIN splits s ON s.id = wt.split_id
                ORDER BY idx
                "#,
            )
            .fetch_all(pool)
            .await?;

            let tpls: Vec<TplJson> = rows
                .into_iter()
                .map(|(idx, name, day, split, exercises, created_at)| TplJson {
                    idx,
                    name,
                    split,
                    day: day.map(|d| day_name(d as u8).to_string()),
                    exercises,
                    created_at,
                })
                .collect();

            emit(fmt, &tpls, || {
                if tpls.is_empty() {
                    println!("{}", "  (no templates found)".dimmed());
                    return;
                }

                println!("{}", "Templates:".cyan().bold());

                let idx_w = tpls
                    .iter()
                    .map(|t| t.idx.to_string().len())
                    .max()
                    .unwrap_or(1);
                let mut left = Vec::<String>::new();
                let mut right = Vec::<String>::new();

                for t in &tpls {
                    let idx = format!("{:>width$}", t.idx, width = idx_w).yellow();
                    let day = t
                        .day
                        .as_deref()
                        .map(|d| format!(" ({d})").dimmed().to_string())
                        .unwrap_or_default();
                    let split = if t.split.is_empty() {
                        String::new()
                    } else {
                        format!("– {}", t.split).dimmed().to_string()
                    };
                    left.push(format!(
                        " {} • {}{} {} ({} exercises)",
                        idx,
                        t.name.bold(),
                        day,
                        split,
                        t.exercises
                    ));
                    right.push(
                        format!("added {}", &t.created_at[..10])
                            .dimmed()
                            .to_string(),
                    );
                }

                let pad_plain = left.iter().map(|s| plain_len(s)).max().unwrap_or(0);
                for (l, r) in left.into_iter().zip(right) {
                    let pad = pad_plain + (l.len() - plain_len(&l));
                    println!("{:<pad$} {} {}", l, "|".blue(), r, pad = pad);
                }
            });
        }

        TemplateCmd::Show { template } => {
            let Some((tpl_id, tpl_name)) = super::resolve_template(pool, &template).await? else {
                println!("{} no template `{}`", "error:".red().bold(), template);
                return Ok(());
            };

            let (day, split): (Option<i64>, Option<String>) = sqlx::query_as(
                r#"
                SELECT wt.day_of_week, s.name
                FROM workout_templates wt
                LEFT JOIN splits s ON s.id = wt.split_id
                WHERE wt.id = ?
                "#,
            )
            .bind(&tpl_id)
            .fetch_one(pool)
            .await?;

            let slots: Vec<(String, i64, i64, i64)> = sqlx::query_as(
                r#"
                SELECT e.name, te.target_sets, te.rep_range_min, te.rep_range_max
                FROM template_exercises te
                JOIN exercises e ON e.id = te.exercise_id
                WHERE te.template_id = ?
                ORDER BY te.position
                "#,
            )
            .bind(&tpl_id)
            .fetch_all(pool)
            .await?;

            #[derive(Serialize)]
            struct SlotJson {
                exercise: String,
                target_sets: i64,
                rep_range_min: i64,
                rep_range_max: i64,
            }

            #[derive(Serialize)]
            struct DetailJson {
                name: String,
                split: Option<String>,
                day: Option<String>,
                slots: Vec<SlotJson>,
            }

            let detail = DetailJson {
                name: tpl_name.clone(),
                split,
                day: day.map(|d| day_name(d as u8).to_string()),
                slots: slots
                    .into_iter()
                    .map(|(exercise, target_sets, rep_range_min, rep_range_max)| SlotJson {
                        exercise,
                        target_sets,
                        rep_range_min,
                        rep_range_max,
                    })
                    .collect(),
            };

            emit(fmt, &detail, || {
                let day = detail
                    .day
                    .as_deref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                println!("{} {}{}", "Template:".cyan().bold(), detail.name.bold(), day);
                if let Some(split) = &detail.split {
                    println!("{} {}", "Split:".cyan().bold(), split);
                }

                for (i, slot) in detail.slots.iter().enumerate() {
                    let idx = format!("{}", i + 1).yellow();
                    let reps = if slot.rep_range_min == slot.rep_range_max {
                        format!("{}", slot.rep_range_min)
                    } else {
                        format!("{}-{}", slot.rep_range_min, slot.rep_range_max)
                    };
                    println!(
                        "{} • {} – {} sets ({})",
                        idx,
                        slot.exercise.bold(),
                        slot.target_sets,
                        reps
                    );
                }

                if detail.slots.is_empty() {
                    println!("{}", "  (no exercises)".dimmed());
                }
            });
        }

        TemplateCmd::Edit { template, file } => {
            let Some((tpl_id, tpl_name)) = super::resolve_template(pool, &template).await? else {
                println!("{} no template `{}`", "error:".red().bold(), template);
                return Ok(());
            };

            let toml_str = read_to_string(&file).with_context(|| format!("reading `{file}`"))?;
            let parsed: TemplateFile =
                toml::from_str(&toml_str).with_context(|| format!("parsing `{file}`"))?;

            let Some(slots) = validate_template_def(pool, &parsed.template).await? else {
                return Ok(());
            };

            let day_of_week = match parsed.template.day.as_deref() {
                Some(d) => match parse_day_of_week(d) {
                    Some(n) => Some(n as i64),
                    None => {
                        println!("{} unknown day `{}`", "error:".red().bold(), d);
                        return Ok(());
                    }
                },
                None => None,
            };

            // Replace-all edit: old slots out, new slots in, one
            // transaction so a half-edited template can never be seen.
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM template_exercises WHERE template_id = ?")
                .bind(&tpl_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("UPDATE workout_templates SET day_of_week = ? WHERE id = ?")
                .bind(day_of_week)
                .bind(&tpl_id)
                .execute(&mut *tx)
                .await?;

            for (position, (exercise_id, sets, rep_min, rep_max)) in slots.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO template_exercises
                      (id, template_id, exercise_id, position, target_sets, rep_range_min, rep_range_max)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&tpl_id)
                .bind(exercise_id)
                .bind(position as i64)
                .bind(*sets as i64)
                .bind(*rep_min as i64)
                .bind(*rep_max as i64)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;

            println!(
                "{} `{}` now has {} exercise(s)",
                "ok:".green().bold(),
                tpl_name.bold(),
                slots.len()
            );
        }

        TemplateCmd::Delete { template } => {
            let Some((tpl_id, tpl_name)) = super::resolve_template(pool, &template).await? else {
                println!("{} no template `{}`", "error:".red().bold(), template);
                return Ok(());
            };

            // Slots cascade; completed sessions keep their own copy of
            // the name and survive.
            sqlx::query("DELETE FROM workout_templates WHERE id = ?")
                .bind(&tpl_id)
                .execute(pool)
                .await?;

            println!(
                "{} deleted `{}` – completed sessions keep their history",
                "ok:".green().bold(),
                tpl_name.bold()
            );
        }
    }

    Ok(())
}

/// Resolves a template definition's exercise names and rep ranges.
/// Prints what is wrong and returns `None` when the definition cannot
/// be imported as-is.
async fn validate_template_def(
    pool: &SqlitePool,
    def: &TemplateDef,
) -> Result<Option<Vec<(String, u32, u32, u32)>>> {
    let mut slots = Vec::new();
    let mut missing = Vec::<&str>::new();

    for ex in &def.exercises {
        let Some((min, max)) = parse_rep_range(&ex.reps) else {
            println!(
                "{} invalid rep range `{}` for `{}` in `{}`",
                "warning:".yellow().bold(),
                ex.reps,
                ex.name,
                def.name
            );
            return Ok(None);
        };

        if ex.sets == 0 {
            println!(
                "{} `{}` in `{}` needs at least one set",
                "warning:".yellow().bold(),
                ex.name,
                def.name
            );
            return Ok(None);
        }

        match super::resolve_exercise(pool, &ex.name).await? {
            Some((id, _)) => slots.push((id, ex.sets, min, max)),
            None => missing.push(&ex.name),
        }
    }

    if !missing.is_empty() {
        println!(
            "{} cannot import `{}` – missing exercises: {}",
            "warning:".yellow().bold(),
            def.name,
            missing.join(", ")
        );

        let names = super::exercise_names(pool).await?;
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        for &m in &missing {
            if let Some(sug) = crate::types::best_suggestion(m, names.iter().copied()) {
                println!("{} for `{}` did you mean: `{}`?", "note:".blue().bold(), m, sug.green());
            }
        }

        return Ok(None);
    }

    Ok(Some(slots))
}

async fn import_split_file(pool: &SqlitePool, file: &str) -> Result<()> {
    let toml_str = read_to_string(file).with_context(|| format!("reading `{file}`"))?;
    let parsed: SplitFile = toml::from_str(&toml_str).with_context(|| format!("parsing `{file}`"))?;
    let split = parsed.split;

    // Validate everything up front so the transaction below either
    // imports the whole file or nothing.
    let mut workouts = Vec::new();
    let mut seen = HashSet::new();
    for def in &split.workouts {
        if !seen.insert(def.name.as_str()) {
            println!(
                "{} split `{}` lists `{}` twice – skipped",
                "warning:".yellow().bold(),
                split.name,
                def.name
            );
            return Ok(());
        }

        let day_of_week = match def.day.as_deref() {
            Some(d) => match parse_day_of_week(d) {
                Some(n) => Some(n as i64),
                None => {
                    println!(
                        "{} unknown day `{}` for `{}` in split `{}`",
                        "warning:".yellow().bold(),
                        d,
                        def.name,
                        split.name
                    );
                    return Ok(());
                }
            },
            None => None,
        };

        let Some(slots) = validate_template_def(pool, def).await? else {
            return Ok(());
        };

        workouts.push((def.name.as_str(), day_of_week, slots));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let split_id = Uuid::new_v4().to_string();
    let res = sqlx::query("INSERT INTO splits (id, name, created_at) VALUES (?1, ?2, ?3)")
        .bind(&split_id)
        .bind(&split.name)
        .bind(now)
        .execute(&mut *tx)
        .await;

    if let Err(sqlx::Error::Database(db_err)) = &res {
        if db_err.code() == Some("2067".into()) {
            // 2067 = SQLITE_CONSTRAINT_UNIQUE
            println!(
                "{} split `{}` already exists – skipping",
                "warning:".yellow().bold(),
                split.name
            );
            tx.rollback().await?;
            return Ok(());
        }
    }
    res?;

    for (position, (name, day_of_week, slots)) in workouts.iter().enumerate() {
        let template_id = Uuid::new_v4().to_string();
        let res = sqlx::query(
            r#"
            INSERT INTO workout_templates (id, split_id, name, day_of_week, position, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&template_id)
        .bind(&split_id)
        .bind(name)
        .bind(day_of_week)
        .bind(position as i64)
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &res {
            if db_err.code() == Some("2067".into()) {
                println!(
                    "{} template `{}` already exists – nothing imported",
                    "warning:".yellow().bold(),
                    name
                );
                tx.rollback().await?;
                return Ok(());
            }
        }
        res?;

        for (slot_pos, (exercise_id, sets, rep_min, rep_max)) in slots.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO template_exercises
                  (id, template_id, exercise_id, position, target_sets, rep_range_min, rep_range_max)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&template_id)
            .bind(exercise_id)
            .bind(slot_pos as i64)
            .bind(*sets as i64)
            .bind(*rep_min as i64)
            .bind(*rep_max as i64)
            .execute(&mut *tx)
            .await?;
        }

        println!(
            "{} `{}` ({} exercises)",
            "ok:".green().bold(),
            name,
            slots.len()
        );
    }

    tx.commit().await?;

    println!(
        "\n{} split `{}` imported with {} template(s)",
        "Summary:".cyan().bold(),
        split.name,
        split.workouts.len()
    );

    Ok(())
}
