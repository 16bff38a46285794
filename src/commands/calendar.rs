use anyhow::Result;
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use colored::Colorize;
use sqlx::SqlitePool;

pub async fn handle(pool: &SqlitePool, year: Option<i32>, month: Option<u32>) -> Result<()> {
    let today = Local::now().date_naive();
    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());

    if !(1..=12).contains(&month) {
        println!("{} month must be between 1 and 12", "error:".red().bold());
        return Ok(());
    }

    let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) else {
        println!("{} invalid year `{}`", "error:".red().bold(), year);
        return Ok(());
    };
    let last_day = match month {
        12 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        _ => NaiveDate::from_ymd_opt(year, month + 1, 1),
    }
    .and_then(|d| d.pred_opt())
    .unwrap_or(first_day);

    let rows: Vec<(DateTime<Utc>, String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT ws.completed_at, ws.template_name, ws.duration_seconds,
               COUNT(sl.id) AS sets
        FROM workout_sessions ws
        LEFT JOIN set_logs sl ON sl.session_id = ws.id
        WHERE ws.completed_at IS NOT NULL
        GROUP BY ws.id
        ORDER BY ws.completed_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    // Calendar days follow the local clock, not UTC.
    let sessions: Vec<(NaiveDate, DateTime<Utc>, String, i64, i64)> = rows
        .into_iter()
        .filter_map(|(completed_at, name, duration, sets)| {
            let local_day = completed_at.with_timezone(&Local).date_naive();
            (local_day.year() == year && local_day.month() == month)
                .then_some((local_day, completed_at, name, duration, sets))
        })
        .collect();

    let mut trained_days = std::collections::HashSet::new();
    for (day, ..) in &sessions {
        trained_days.insert(day.day());
    }

    println!("\n{}", first_day.format("%B %Y").to_string().bold().cyan());
    println!("{}", "Mo Tu We Th Fr Sa Su".dimmed());

    let first_weekday = first_day.weekday().num_days_from_monday() as usize;
    print!("{}", "   ".repeat(first_weekday));

    for day in 1..=last_day.day() {
        if trained_days.contains(&day) {
            print!("{:>2} ", day.to_string().green().bold());
        } else if first_day.with_day(day) == Some(today) {
            print!("{:>2} ", day.to_string().bold());
        } else {
            print!("{day:>2} ");
        }

        if (first_weekday + day as usize) % 7 == 0 {
            println!();
        }
    }
    println!("\n");

    if sessions.is_empty() {
        println!("{}", "  (no workouts this month)".dimmed());
        return Ok(());
    }

    println!("{}", "Workouts:".bold().cyan());
    for (_, completed_at, name, duration, sets) in sessions {
        let local = completed_at.with_timezone(&Local);
        println!(
            "  {} ({}) {} {} – {} set(s)",
            local.format("%a %d %H:%M").to_string().green(),
            short_duration(duration),
            "|".blue(),
            name.bold(),
            sets
        );
    }

    Ok(())
}

fn short_duration(secs: i64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
