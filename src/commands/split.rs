use std::collections::HashMap;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::cli::SplitCmd;
use crate::types::day_name;
use crate::{OutputFmt, emit};

#[derive(Serialize)]
struct SplitJson {
    idx: i64,
    name: String,
    templates: Vec<String>,
    created_at: String,
}

pub async fn handle(cmd: SplitCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    match cmd {
        SplitCmd::List => {
            let rows: Vec<(i64, String, String, String)> = sqlx::query_as(
                r#"
                SELECT ROW_NUMBER() OVER (ORDER BY created_at, rowid) AS idx,
                       id, name, created_at
                FROM splits
                ORDER BY idx
                "#,
            )
            .fetch_all(pool)
            .await?;

            let tpl_rows: Vec<(String, String, Option<i64>)> = sqlx::query_as(
                r#"
                SELECT split_id, name, day_of_week
                FROM workout_templates
                WHERE split_id IS NOT NULL
                ORDER BY position, created_at
                "#,
            )
            .fetch_all(pool)
            .await?;

            let mut by_split: HashMap<String, Vec<String>> = HashMap::new();
            for (split_id, name, day) in tpl_rows {
                let label = match day {
                    Some(d) => format!("{} ({})", name, day_name(d as u8)),
                    None => name,
                };
                by_split.entry(split_id).or_default().push(label);
            }

            let splits: Vec<SplitJson> = rows
                .into_iter()
                .map(|(idx, id, name, created_at)| SplitJson {
                    idx,
                    name,
                    templates: by_split.remove(&id).unwrap_or_default(),
                    created_at,
                })
                .collect();

            emit(fmt, &splits, || {
                if splits.is_empty() {
                    println!("{}", "  (no splits found)".dimmed());
                    return;
                }

                println!("{}", "Splits:".cyan().bold());
                for s in &splits {
                    let idx = format!("{}", s.idx).yellow();
                    println!(
                        " {} • {} {}",
                        idx,
                        s.name.bold(),
                        format!("added {}", &s.created_at[..10]).dimmed()
                    );

                    for (i, t) in s.templates.iter().enumerate() {
                        let connector = if i + 1 == s.templates.len() {
                            "└─"
                        } else {
                            "├─"
                        };
                        println!("     {} {}", connector, t);
                    }
                }
            });
        }

        SplitCmd::Delete { split } => {
            let Some((split_id, split_name)) = super::resolve_split(pool, &split).await? else {
                println!("{} no split `{}`", "error:".red().bold(), split);
                return Ok(());
            };

            // Templates and their slots cascade in one statement-level
            // transaction; session history keeps its denormalized names.
            let res = sqlx::query("DELETE FROM splits WHERE id = ?")
                .bind(&split_id)
                .execute(pool)
                .await?;

            if res.rows_affected() == 1 {
                println!(
                    "{} deleted `{}` and its templates",
                    "ok:".green().bold(),
                    split_name.bold()
                );
            } else {
                println!("{} nothing deleted", "warning:".yellow().bold());
            }
        }
    }

    Ok(())
}
