use anyhow::Result;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::collections::HashMap;

use crate::db::DB;
use crate::store::{self, ExerciseSetRow, HistoryScope};
use crate::types::{WEIGHT_EPSILON, weights_equal};

/// Trend classification for one tracked exercise. Variant order is the
/// report order: plateaus surface first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStatus {
    Stalled,
    Progressing,
    Maintaining,
}

impl TrendStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stalled => "stalled",
            Self::Progressing => "progressing",
            Self::Maintaining => "maintaining",
        }
    }
}

/// One exercise's progression report entry.
#[derive(Debug, Clone, Serialize)]
pub struct ExerciseProgress {
    pub exercise_id: String,
    pub exercise_name: String,
    pub status: TrendStatus,
    /// Every rep of the latest session reached the target ceiling;
    /// next session should load more weight.
    pub ready_to_increase: bool,
    /// `None` when the exercise has no logged history yet.
    pub current_weight_kg: Option<f64>,
    pub sessions_at_current_weight: u32,
    pub last_reps: Vec<u32>,
    pub prev_reps: Vec<u32>,
    pub target_rep_min: u32,
    pub target_rep_max: u32,
    pub best_weight_kg: Option<f64>,
    /// Template name of the session that produced `best_weight_kg`.
    pub best_weight_source: Option<String>,
    pub last_performed: Option<DateTime<Utc>>,
}

/// One completed session's work on a single exercise, newest first in
/// the surrounding list.
#[derive(Debug, Clone, PartialEq)]
struct SessionWork {
    completed_at: DateTime<Utc>,
    template_name: String,
    /// The working weight: the last-logged set wins when a session
    /// mixes weights (e.g. a drop set).
    weight_kg: f64,
    reps: Vec<u32>,
    max_weight_kg: f64,
}

/// Classifies every exercise that appears in a template's exercise
/// list, against the completed sessions selected by `scope`. Report is
/// sorted stalled, progressing, maintaining.
pub async fn analyze(pool: &DB, scope: &HistoryScope) -> Result<Vec<ExerciseProgress>> {
    let template_id = match scope {
        HistoryScope::Template(id) => Some(id.as_str()),
        _ => None,
    };

    let targets = store::tracked_exercises(pool, template_id).await?;
    let ids: Vec<String> = targets.iter().map(|t| t.exercise_id.clone()).collect();
    let rows = store::completed_sets_for_exercises(pool, &ids, scope).await?;

    // Rows arrive newest-session-first; split them per exercise
    // without disturbing that order.
    let mut per_exercise: HashMap<&str, Vec<&ExerciseSetRow>> = HashMap::new();
    for row in &rows {
        per_exercise.entry(&row.exercise_id).or_default().push(row);
    }

    let mut report: Vec<ExerciseProgress> = targets
        .iter()
        .map(|target| {
            let sessions = per_exercise
                .get(target.exercise_id.as_str())
                .map(|rows| group_sessions(rows))
                .unwrap_or_default();

            let outcome = classify(&sessions, target.rep_range_max);
            let (best_weight_kg, best_weight_source) = personal_best(&sessions);

            ExerciseProgress {
                exercise_id: target.exercise_id.clone(),
                exercise_name: target.exercise_name.clone(),
                status: outcome.status,
                ready_to_increase: outcome.ready_to_increase,
                current_weight_kg: outcome.current_weight_kg,
                sessions_at_current_weight: outcome.sessions_at_current_weight,
                last_reps: sessions.first().map(|s| s.reps.clone()).unwrap_or_default(),
                prev_reps: sessions.get(1).map(|s| s.reps.clone()).unwrap_or_default(),
                target_rep_min: target.rep_range_min,
                target_rep_max: target.rep_range_max,
                best_weight_kg,
                best_weight_source,
                last_performed: sessions.first().map(|s| s.completed_at),
            }
        })
        .collect();

    report.sort_by_key(|p| p.status);
    Ok(report)
}

/// Collapses ordered set rows into per-session work, one entry per
/// session, preserving newest-first order.
fn group_sessions(rows: &[&ExerciseSetRow]) -> Vec<SessionWork> {
    let chunks = rows.iter().chunk_by(|r| r.session_id.as_str());
    chunks
        .into_iter()
        .map(|(_, sets)| {
            let sets: Vec<&&ExerciseSetRow> = sets.collect();
            let reps: Vec<u32> = sets.iter().map(|r| r.reps).collect();
            let max_weight_kg = sets.iter().map(|r| r.weight_kg).fold(0.0, f64::max);
            let last = sets.last().map(|r| r.weight_kg).unwrap_or(0.0);
            let first = sets.first().map(|r| **r);

            SessionWork {
                completed_at: first.map(|r| r.completed_at).unwrap_or_default(),
                template_name: first.map(|r| r.template_name.clone()).unwrap_or_default(),
                weight_kg: last,
                reps,
                max_weight_kg,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Outcome {
    status: TrendStatus,
    ready_to_increase: bool,
    current_weight_kg: Option<f64>,
    sessions_at_current_weight: u32,
}

/// The ordered classification rules; the first match wins. Rewards
/// rep-volume gains and flags three non-improving sessions at the same
/// load as a plateau.
fn classify(sessions: &[SessionWork], target_rep_max: u32) -> Outcome {
    let Some(last) = sessions.first() else {
        return Outcome {
            status: TrendStatus::Maintaining,
            ready_to_increase: false,
            current_weight_kg: None,
            sessions_at_current_weight: 0,
        };
    };

    let sessions_at_current_weight = sessions
        .iter()
        .take_while(|s| weights_equal(s.weight_kg, last.weight_kg))
        .count() as u32;

    let current = Outcome {
        status: TrendStatus::Maintaining,
        ready_to_increase: false,
        current_weight_kg: Some(last.weight_kg),
        sessions_at_current_weight,
    };

    if !last.reps.is_empty() && last.reps.iter().all(|r| *r >= target_rep_max) {
        return Outcome {
            status: TrendStatus::Progressing,
            ready_to_increase: true,
            ..current
        };
    }

    let prev = sessions.get(1);
    let last_total: u32 = last.reps.iter().sum();
    let prev_total: u32 = prev.map(|s| s.reps.iter().sum()).unwrap_or(0);

    if sessions_at_current_weight >= 3 && (prev.is_none() || last_total <= prev_total) {
        return Outcome {
            status: TrendStatus::Stalled,
            ..current
        };
    }

    if prev.is_some() && last_total > prev_total {
        return Outcome {
            status: TrendStatus::Progressing,
            ..current
        };
    }

    current
}

/// All-time best working weight in scope and the workout it came from.
/// Ties keep the most recent occurrence.
fn personal_best(sessions: &[SessionWork]) -> (Option<f64>, Option<String>) {
    let mut best: Option<(f64, &str)> = None;
    for session in sessions {
        match best {
            Some((w, _)) if session.max_weight_kg <= w + WEIGHT_EPSILON => {}
            _ => best = Some((session.max_weight_kg, &session.template_name)),
        }
    }

    match best {
        Some((w, source)) => (Some(w), Some(source.to_string())),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn work(days_ago: i64, weight: f64, reps: &[u32]) -> SessionWork {
        let base = Utc.with_ymd_and_hms(2025, 4, 1, 19, 0, 0).unwrap();
        SessionWork {
            completed_at: base - Duration::days(days_ago),
            template_name: "Push Day".into(),
            weight_kg: weight,
            reps: reps.to_vec(),
            max_weight_kg: weight,
        }
    }

    #[test]
    fn hitting_the_rep_ceiling_signals_a_weight_increase() {
        let sessions = vec![work(0, 100.0, &[12, 12, 12]), work(3, 100.0, &[10, 10, 10])];
        let out = classify(&sessions, 12);

        assert_eq!(out.status, TrendStatus::Progressing);
        assert!(out.ready_to_increase);
        assert_eq!(out.current_weight_kg, Some(100.0));
    }

    #[test]
    fn three_flat_sessions_at_one_weight_stall() {
        let sessions = vec![
            work(0, 80.0, &[8, 8, 8]),
            work(3, 80.0, &[9, 8, 8]),
            work(6, 80.0, &[8, 8, 8]),
        ];
        let out = classify(&sessions, 12);

        assert_eq!(out.sessions_at_current_weight, 3);
        assert_eq!(out.status, TrendStatus::Stalled);
        assert!(!out.ready_to_increase);
    }

    #[test]
    fn more_total_reps_than_last_time_is_progress() {
        let sessions = vec![work(0, 80.0, &[10, 9, 8]), work(3, 80.0, &[9, 9, 8])];
        let out = classify(&sessions, 12);

        assert_eq!(out.status, TrendStatus::Progressing);
        assert!(!out.ready_to_increase);
    }

    #[test]
    fn a_weight_change_resets_the_stall_counter() {
        let sessions = vec![
            work(0, 82.5, &[8, 8, 8]),
            work(3, 80.0, &[10, 10, 10]),
            work(6, 80.0, &[10, 10, 10]),
        ];
        let out = classify(&sessions, 12);

        assert_eq!(out.sessions_at_current_weight, 1);
        assert_ne!(out.status, TrendStatus::Stalled);
    }

    #[test]
    fn no_history_reads_as_maintaining_with_no_weight() {
        let out = classify(&[], 12);

        assert_eq!(out.status, TrendStatus::Maintaining);
        assert_eq!(out.current_weight_kg, None);
        assert_eq!(out.sessions_at_current_weight, 0);
    }

    #[test]
    fn a_single_heavy_session_is_not_yet_a_stall() {
        let sessions = vec![work(0, 80.0, &[8, 8, 8])];
        let out = classify(&sessions, 12);

        assert_eq!(out.status, TrendStatus::Maintaining);
        assert_eq!(out.sessions_at_current_weight, 1);
    }

    #[test]
    fn report_order_puts_stalls_first() {
        let mut statuses = [
            TrendStatus::Maintaining,
            TrendStatus::Progressing,
            TrendStatus::Stalled,
        ];
        statuses.sort();

        assert_eq!(
            statuses,
            [
                TrendStatus::Stalled,
                TrendStatus::Progressing,
                TrendStatus::Maintaining
            ]
        );
    }

    #[test]
    fn drop_sets_use_the_last_logged_weight() {
        let base = Utc.with_ymd_and_hms(2025, 4, 1, 19, 0, 0).unwrap();
        let rows = [
            ExerciseSetRow {
                exercise_id: "ex".into(),
                session_id: "s1".into(),
                template_name: "Push Day".into(),
                completed_at: base,
                set_number: 1,
                reps: 8,
                weight_kg: 100.0,
            },
            ExerciseSetRow {
                exercise_id: "ex".into(),
                session_id: "s1".into(),
                template_name: "Push Day".into(),
                completed_at: base,
                set_number: 2,
                reps: 12,
                weight_kg: 80.0,
            },
        ];
        let refs: Vec<&ExerciseSetRow> = rows.iter().collect();
        let sessions = group_sessions(&refs);

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].weight_kg, 80.0);
        assert_eq!(sessions[0].max_weight_kg, 100.0);
        assert_eq!(sessions[0].reps, vec![8, 12]);
    }
}
