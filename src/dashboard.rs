use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;

use crate::db::DB;
use crate::store::{self, TemplateRecency};

/// Aggregate view for the landing screen: streak, current week,
/// suggested next workout.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub streak_days: u32,
    pub this_week: WeekStats,
    pub suggested: Option<SuggestedWorkout>,
    pub has_history: bool,
    pub worked_out_today: bool,
}

/// Monday-start week summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekStats {
    pub completed_sessions: u32,
    /// active_days[0] = Monday .. active_days[6] = Sunday.
    pub active_days: [bool; 7],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedWorkout {
    pub template_id: String,
    pub name: String,
    pub reason: SuggestionReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionReason {
    /// The template's configured day-of-week is today.
    ScheduledToday,
    /// Longest time since last completion; `None` = never performed.
    LongestGap { days_since: Option<i64> },
}

pub async fn get_dashboard(pool: &DB, now: DateTime<Utc>) -> Result<Dashboard> {
    let instants = store::completed_session_instants(pool).await?;
    let templates = store::templates_with_recency(pool).await?;

    // Calendar math happens in the user's timezone; a session finished
    // at 23:30 local belongs to that local day.
    let today = now.with_timezone(&Local).date_naive();
    let days: Vec<NaiveDate> = instants
        .iter()
        .map(|t| t.with_timezone(&Local).date_naive())
        .collect();

    let worked_out_today = days.contains(&today);

    Ok(Dashboard {
        streak_days: streak(&days, today),
        this_week: week_stats(&days, today),
        suggested: suggest(&templates, today),
        has_history: !days.is_empty(),
        worked_out_today,
    })
}

/// Consecutive days with at least one completed session, walking
/// backward from today (or yesterday, when today is still open). One
/// missing day ends the count.
pub fn streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let distinct: HashSet<NaiveDate> = days.iter().copied().collect();

    let mut cursor = if distinct.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while distinct.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }

    streak
}

/// Sessions completed in the week containing `today`.
pub fn week_stats(days: &[NaiveDate], today: NaiveDate) -> WeekStats {
    let week_start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let week_end = week_start + Duration::days(7);

    let mut completed_sessions = 0;
    let mut active_days = [false; 7];

    for day in days {
        if *day >= week_start && *day < week_end {
            completed_sessions += 1;
            active_days[day.weekday().num_days_from_monday() as usize] = true;
        }
    }

    WeekStats {
        completed_sessions,
        active_days,
    }
}

/// Picks the next workout: a template scheduled for today's weekday
/// wins outright; otherwise the one idle the longest, with
/// never-performed templates treated as idle forever. Ties go to the
/// earliest-created template.
pub fn suggest(templates: &[TemplateRecency], today: NaiveDate) -> Option<SuggestedWorkout> {
    let weekday = today.weekday().num_days_from_monday() as u8;

    if let Some(t) = templates.iter().find(|t| t.day_of_week == Some(weekday)) {
        return Some(SuggestedWorkout {
            template_id: t.template_id.clone(),
            name: t.name.clone(),
            reason: SuggestionReason::ScheduledToday,
        });
    }

    // `None` sorts below every instant, so a never-performed template
    // is the minimum. min_by_key keeps the first of equals.
    let t = templates.iter().min_by_key(|t| t.last_completed)?;

    let days_since = t
        .last_completed
        .map(|at| (today - at.with_timezone(&Local).date_naive()).num_days());

    Some(SuggestedWorkout {
        template_id: t.template_id.clone(),
        name: t.name.clone(),
        reason: SuggestionReason::LongestGap { days_since },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tpl(id: &str, day_of_week: Option<u8>, last: Option<(i32, u32, u32)>) -> TemplateRecency {
        TemplateRecency {
            template_id: id.into(),
            name: id.to_uppercase(),
            day_of_week,
            last_completed: last.map(|(y, m, day)| Utc.with_ymd_and_hms(y, m, day, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn one_gap_day_breaks_the_streak() {
        // Mon, Tue, Thu of one week; checking on Friday.
        let days = vec![d(2025, 3, 10), d(2025, 3, 11), d(2025, 3, 13)];
        assert_eq!(streak(&days, d(2025, 3, 14)), 1);
    }

    #[test]
    fn todays_session_extends_the_streak() {
        let days = vec![d(2025, 3, 12), d(2025, 3, 13), d(2025, 3, 14)];
        assert_eq!(streak(&days, d(2025, 3, 14)), 3);
    }

    #[test]
    fn an_open_today_still_counts_back_from_yesterday() {
        let days = vec![d(2025, 3, 12), d(2025, 3, 13)];
        assert_eq!(streak(&days, d(2025, 3, 14)), 2);
    }

    #[test]
    fn stale_history_means_no_streak() {
        let days = vec![d(2025, 3, 10)];
        assert_eq!(streak(&days, d(2025, 3, 14)), 0);
        assert_eq!(streak(&[], d(2025, 3, 14)), 0);
    }

    #[test]
    fn duplicate_days_count_once_for_the_streak() {
        let days = vec![d(2025, 3, 13), d(2025, 3, 13), d(2025, 3, 14)];
        assert_eq!(streak(&days, d(2025, 3, 14)), 2);
    }

    #[test]
    fn week_stats_start_on_monday() {
        // 2025-03-14 is a Friday; the 9th (Sunday) is last week.
        let days = vec![d(2025, 3, 9), d(2025, 3, 10), d(2025, 3, 13), d(2025, 3, 13)];
        let stats = week_stats(&days, d(2025, 3, 14));

        assert_eq!(stats.completed_sessions, 3);
        let mut expected = [false; 7];
        expected[0] = true; // Monday
        expected[3] = true; // Thursday
        assert_eq!(stats.active_days, expected);
    }

    #[test]
    fn todays_schedule_outranks_any_gap() {
        // 2025-03-14 is a Friday (weekday 4).
        let templates = vec![
            tpl("b", None, None),
            tpl("a", Some(4), Some((2025, 3, 12))),
        ];

        let s = suggest(&templates, d(2025, 3, 14)).unwrap();
        assert_eq!(s.template_id, "a");
        assert_eq!(s.reason, SuggestionReason::ScheduledToday);
    }

    #[test]
    fn never_performed_beats_any_performed_template() {
        let templates = vec![
            tpl("a", Some(0), Some((2025, 3, 1))),
            tpl("b", None, None),
        ];

        let s = suggest(&templates, d(2025, 3, 14)).unwrap();
        assert_eq!(s.template_id, "b");
        assert_eq!(s.reason, SuggestionReason::LongestGap { days_since: None });
    }

    #[test]
    fn oldest_completion_wins_the_gap_race() {
        let templates = vec![
            tpl("a", None, Some((2025, 3, 12))),
            tpl("b", None, Some((2025, 3, 2))),
        ];

        let s = suggest(&templates, d(2025, 3, 14)).unwrap();
        assert_eq!(s.template_id, "b");
        match s.reason {
            SuggestionReason::LongestGap {
                days_since: Some(n),
            } => assert!(n >= 11, "expected at least 11 days, got {n}"),
            other => panic!("unexpected reason: {other:?}"),
        }
    }

    #[test]
    fn creation_order_breaks_never_performed_ties() {
        let templates = vec![tpl("a", None, None), tpl("b", None, None)];
        let s = suggest(&templates, d(2025, 3, 14)).unwrap();
        assert_eq!(s.template_id, "a");
    }

    #[test]
    fn no_templates_means_no_suggestion() {
        assert_eq!(suggest(&[], d(2025, 3, 14)), None);
    }
}
