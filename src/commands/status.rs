use anyhow::Result;
use colored::Colorize;
use sqlx::SqlitePool;

use crate::progression::{self, TrendStatus};
use crate::storage::Config;
use crate::store::HistoryScope;
use crate::{OutputFmt, emit};

pub async fn handle(
    pool: &SqlitePool,
    template: Option<String>,
    session: Option<String>,
    config: &Config,
    fmt: OutputFmt,
) -> Result<()> {
    let scope = match (template, session) {
        (_, Some(s)) => HistoryScope::Session(s),
        (Some(t), None) => {
            let Some((tpl_id, _)) = super::resolve_template(pool, &t).await? else {
                println!("{} no such template `{}`", "error:".red().bold(), t);
                return Ok(());
            };
            HistoryScope::Template(tpl_id)
        }
        (None, None) => HistoryScope::All,
    };

    let report = progression::analyze(pool, &scope).await?;

    emit(fmt, &report, || {
        if report.is_empty() {
            println!("{}", "No tracked exercises yet".dimmed());
            println!(
                "{} import a template with `ironlog t import <file.toml>`",
                "note:".blue().bold()
            );
            return;
        }

        println!("{}", "Progression:".cyan().bold());

        let unit = config.weight_unit();

        for p in &report {
            let label = match p.status {
                TrendStatus::Stalled => p.status.label().red().bold(),
                TrendStatus::Progressing => p.status.label().green().bold(),
                TrendStatus::Maintaining => p.status.label().yellow().bold(),
            };

            let weight = match p.current_weight_kg {
                Some(w) => unit.format_kg(w),
                None => "never trained".dimmed().to_string(),
            };

            let mut line = format!(" {} {} @ {}", label, p.exercise_name.bold(), weight);

            if p.ready_to_increase {
                line.push_str(&format!(" {}", "↑ ready to increase".green()));
            }

            if p.status == TrendStatus::Stalled {
                line.push_str(
                    &format!(" ({} sessions at this weight)", p.sessions_at_current_weight)
                        .dimmed()
                        .to_string(),
                );
            }

            println!("{line}");

            if !p.last_reps.is_empty() {
                let reps = p
                    .last_reps
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                let target = match (p.target_rep_min, p.target_rep_max) {
                    (min, max) if min == max => format!("{max}"),
                    (min, max) => format!("{min}-{max}"),
                };
                println!("    last: {} reps (target {})", reps, target.dimmed());
            }

            if let Some(best) = p.best_weight_kg {
                let source = p.best_weight_source.as_deref().unwrap_or("freeform");
                println!(
                    "    best: {} {}",
                    unit.format_kg(best),
                    format!("({source})").dimmed()
                );
            }
        }
    });

    Ok(())
}
