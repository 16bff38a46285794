use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use sqlx::SqlitePool;

use crate::dashboard::{self, SuggestionReason};
use crate::types::day_name;
use crate::{OutputFmt, emit};

pub async fn handle(pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    let dash = dashboard::get_dashboard(pool, Utc::now()).await?;

    emit(fmt, &dash, || {
        if !dash.has_history {
            println!("{}", "No workouts logged yet".dimmed());
            println!(
                "{} start one with `ironlog s start <template>`",
                "note:".blue().bold()
            );
            return;
        }

        let streak = if dash.streak_days == 1 {
            "1 day".to_string()
        } else {
            format!("{} days", dash.streak_days)
        };
        let flame = if dash.worked_out_today {
            "🔥".to_string()
        } else {
            "".dimmed().to_string()
        };
        println!("{} {} {}", "Streak:".cyan().bold(), streak.bold(), flame);

        println!(
            "{} {} session(s)",
            "This week:".cyan().bold(),
            dash.this_week.completed_sessions
        );

        let mut days = String::new();
        for (i, active) in dash.this_week.active_days.iter().enumerate() {
            let label = &day_name(i as u8)[..3];
            if *active {
                days.push_str(&format!(" {}", label.green().bold()));
            } else {
                days.push_str(&format!(" {}", label.dimmed()));
            }
        }
        println!(" {}", days.trim_start());

        if let Some(s) = &dash.suggested {
            let reason = match &s.reason {
                SuggestionReason::ScheduledToday => "scheduled for today".to_string(),
                SuggestionReason::LongestGap { days_since } => match days_since {
                    Some(n) => format!("last done {n} day(s) ago"),
                    None => "never performed".to_string(),
                },
            };
            println!(
                "{} {} {}",
                "Up next:".cyan().bold(),
                s.name.bold(),
                format!("({reason})").dimmed()
            );
        }
    });

    Ok(())
}
