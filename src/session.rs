use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DB;
use crate::store::{self, WorkoutReceipt};
use crate::types::WeightUnit;

/// Precondition violations on the active workout. These are caller
/// errors: the state is left untouched and the same call will keep
/// failing until the caller corrects its usage.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("a workout is already in progress (started {started_at})")]
    AlreadyActive { started_at: DateTime<Utc> },

    #[error("no workout is in progress")]
    NoActiveWorkout,

    #[error("no exercise `{0}` in the current workout")]
    UnknownExercise(String),

    #[error("no set {set_number} for `{exercise}`")]
    UnknownSet { exercise: String, set_number: u32 },

    #[error("set {set_number} of `{exercise}` is already completed")]
    SetAlreadyCompleted { exercise: String, set_number: u32 },

    #[error("reps must be greater than zero")]
    InvalidReps,

    #[error("weight must not be negative")]
    InvalidWeight,
}

/// Rest countdown sub-state. The deadline is an absolute instant:
/// remaining time is always derived from it, never counted down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RestTimer {
    Idle,
    Resting { deadline: DateTime<Utc> },
}

/// Result of checking the rest timer against the current instant.
/// `Finished` is reported exactly once per countdown; the transition
/// back to `Idle` happens inside the check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RestPoll {
    Idle,
    Running { remaining: u32 },
    Finished,
}

/// Per-exercise overrides. `None` means "use the global default",
/// which is distinct from an override that happens to equal it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSettings {
    pub rest_seconds_override: Option<u32>,
    pub weight_unit_override: Option<WeightUnit>,
}

/// One set row of the workout in progress. `reps`/`weight_kg` stay
/// empty until the set is completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub set_number: u32,
    pub reps: Option<u32>,
    pub weight_kg: Option<f64>,
    pub completed: bool,
    pub rest_seconds: Option<u32>,
}

impl SetEntry {
    fn pending(set_number: u32) -> Self {
        Self {
            set_number,
            reps: None,
            weight_kg: None,
            completed: false,
            rest_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveExercise {
    pub exercise_id: String,
    pub name: String,
    pub sets: Vec<SetEntry>,
    #[serde(default)]
    pub settings: ExerciseSettings,
}

impl ActiveExercise {
    /// An exercise slot with `target_sets` pending sets, numbered from 1.
    pub fn planned(exercise_id: impl Into<String>, name: impl Into<String>, target_sets: u32) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            name: name.into(),
            sets: (1..=target_sets).map(SetEntry::pending).collect(),
            settings: ExerciseSettings::default(),
        }
    }

    pub fn completed_sets(&self) -> impl Iterator<Item = &SetEntry> {
        self.sets.iter().filter(|s| s.completed)
    }
}

/// The single in-progress workout. Lives outside the database until
/// completion; completing it writes every row in one transaction and
/// destroys this state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveWorkout {
    pub template_id: Option<String>,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub exercises: Vec<ActiveExercise>,
    pub rest: RestTimer,
}

impl ActiveWorkout {
    /// Whole-workout elapsed time, derived from the start instant. A
    /// process suspended for two minutes reports two more minutes on
    /// the next call, with no tick in between.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }

    /// Remaining rest, rounded up to whole seconds and floored at zero.
    pub fn rest_seconds(&self, now: DateTime<Utc>) -> u32 {
        match self.rest {
            RestTimer::Idle => 0,
            RestTimer::Resting { deadline } => remaining_seconds(deadline, now),
        }
    }

    /// Checks the rest countdown, transitioning `Resting -> Idle` when
    /// the deadline has passed. Callers persist the workout afterwards
    /// so the finish signal cannot fire again on a later invocation.
    pub fn poll_rest(&mut self, now: DateTime<Utc>) -> RestPoll {
        match self.rest {
            RestTimer::Idle => RestPoll::Idle,
            RestTimer::Resting { deadline } => {
                let remaining = remaining_seconds(deadline, now);
                if remaining == 0 {
                    self.rest = RestTimer::Idle;
                    RestPoll::Finished
                } else {
                    RestPoll::Running { remaining }
                }
            }
        }
    }

    pub fn total_completed_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.completed_sets().count()).sum()
    }

    pub fn exercise(&self, exercise_id: &str) -> Option<&ActiveExercise> {
        self.exercises.iter().find(|e| e.exercise_id == exercise_id)
    }

    fn exercise_mut(&mut self, exercise_id: &str) -> Result<&mut ActiveExercise, SessionError> {
        self.exercises
            .iter_mut()
            .find(|e| e.exercise_id == exercise_id)
            .ok_or_else(|| SessionError::UnknownExercise(exercise_id.to_string()))
    }
}

fn remaining_seconds(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let ms = (deadline - now).num_milliseconds();
    if ms <= 0 { 0 } else { (ms as u64).div_ceil(1000) as u32 }
}

/// Owns the one-at-a-time active workout and every operation that
/// mutates it. All clock-dependent operations take `now` explicitly.
#[derive(Debug)]
pub struct SessionManager {
    active: Option<ActiveWorkout>,
    default_rest_seconds: u32,
}

impl SessionManager {
    pub fn new(active: Option<ActiveWorkout>, default_rest_seconds: u32) -> Self {
        Self {
            active,
            default_rest_seconds,
        }
    }

    pub fn has_active_workout(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActiveWorkout> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Result<&mut ActiveWorkout, SessionError> {
        self.active.as_mut().ok_or(SessionError::NoActiveWorkout)
    }

    /// Rest duration `complete_set` will arm for this exercise: its
    /// override when set, the global default otherwise.
    pub fn effective_rest_seconds(&self, exercise: &ActiveExercise) -> u32 {
        exercise
            .settings
            .rest_seconds_override
            .unwrap_or(self.default_rest_seconds)
    }

    pub fn start_workout(
        &mut self,
        template_id: Option<String>,
        label: impl Into<String>,
        exercises: Vec<ActiveExercise>,
        now: DateTime<Utc>,
    ) -> Result<&ActiveWorkout, SessionError> {
        if let Some(active) = &self.active {
            return Err(SessionError::AlreadyActive {
                started_at: active.started_at,
            });
        }

        Ok(self.active.insert(ActiveWorkout {
            template_id,
            label: label.into(),
            started_at: now,
            exercises,
            rest: RestTimer::Idle,
        }))
    }

    pub fn add_exercise(
        &mut self,
        exercise_id: impl Into<String>,
        name: impl Into<String>,
        target_sets: u32,
    ) -> Result<(), SessionError> {
        let workout = self.active_mut()?;
        workout
            .exercises
            .push(ActiveExercise::planned(exercise_id, name, target_sets));
        Ok(())
    }

    /// Drops an exercise and everything logged against it. Nothing has
    /// been written to the database yet, so completed sets vanish too.
    pub fn remove_exercise(&mut self, exercise_id: &str) -> Result<ActiveExercise, SessionError> {
        let workout = self.active_mut()?;
        let pos = workout
            .exercises
            .iter()
            .position(|e| e.exercise_id == exercise_id)
            .ok_or_else(|| SessionError::UnknownExercise(exercise_id.to_string()))?;

        Ok(workout.exercises.remove(pos))
    }

    /// Appends a pending set, returning its number.
    pub fn add_set(&mut self, exercise_id: &str) -> Result<u32, SessionError> {
        let workout = self.active_mut()?;
        let exercise = workout.exercise_mut(exercise_id)?;
        let next = exercise.sets.len() as u32 + 1;
        exercise.sets.push(SetEntry::pending(next));
        Ok(next)
    }

    /// Removes a pending set and renumbers the rest contiguously from 1.
    pub fn remove_set(&mut self, exercise_id: &str, set_number: u32) -> Result<(), SessionError> {
        let workout = self.active_mut()?;
        let exercise = workout.exercise_mut(exercise_id)?;
        let name = exercise.name.clone();

        let pos = exercise
            .sets
            .iter()
            .position(|s| s.set_number == set_number)
            .ok_or(SessionError::UnknownSet {
                exercise: name.clone(),
                set_number,
            })?;

        if exercise.sets[pos].completed {
            return Err(SessionError::SetAlreadyCompleted {
                exercise: name,
                set_number,
            });
        }

        exercise.sets.remove(pos);
        for (i, set) in exercise.sets.iter_mut().enumerate() {
            set.set_number = i as u32 + 1;
        }

        Ok(())
    }

    /// Marks a set completed and arms the rest timer with the effective
    /// rest duration. This is the only operation that arms it
    /// implicitly. Returns the armed duration.
    pub fn complete_set(
        &mut self,
        exercise_id: &str,
        set_number: u32,
        reps: u32,
        weight_kg: f64,
        now: DateTime<Utc>,
    ) -> Result<u32, SessionError> {
        if reps == 0 {
            return Err(SessionError::InvalidReps);
        }
        if weight_kg < 0.0 {
            return Err(SessionError::InvalidWeight);
        }

        let default_rest = self.default_rest_seconds;
        let workout = self.active_mut()?;
        let exercise = workout.exercise_mut(exercise_id)?;
        let name = exercise.name.clone();
        let rest = exercise
            .settings
            .rest_seconds_override
            .unwrap_or(default_rest);

        let set = exercise
            .sets
            .iter_mut()
            .find(|s| s.set_number == set_number)
            .ok_or(SessionError::UnknownSet {
                exercise: name.clone(),
                set_number,
            })?;

        if set.completed {
            return Err(SessionError::SetAlreadyCompleted {
                exercise: name,
                set_number,
            });
        }

        set.reps = Some(reps);
        set.weight_kg = Some(weight_kg);
        set.completed = true;
        set.rest_seconds = Some(rest);

        workout.rest = RestTimer::Resting {
            deadline: now + Duration::seconds(rest as i64),
        };

        Ok(rest)
    }

    /// Replaces an exercise's override record. Already-completed sets
    /// keep the rest duration they were logged with.
    pub fn set_exercise_settings(
        &mut self,
        exercise_id: &str,
        settings: ExerciseSettings,
    ) -> Result<(), SessionError> {
        let workout = self.active_mut()?;
        let exercise = workout.exercise_mut(exercise_id)?;
        exercise.settings = settings;
        Ok(())
    }

    /// Arms the rest timer manually, replacing any running countdown.
    pub fn start_rest_timer(&mut self, seconds: u32, now: DateTime<Utc>) -> Result<(), SessionError> {
        let workout = self.active_mut()?;
        workout.rest = RestTimer::Resting {
            deadline: now + Duration::seconds(seconds as i64),
        };
        Ok(())
    }

    /// Adds time to the countdown. An expired or idle timer restarts
    /// from `now`. Returns the new remaining seconds.
    pub fn extend_rest_timer(&mut self, seconds: u32, now: DateTime<Utc>) -> Result<u32, SessionError> {
        let workout = self.active_mut()?;
        let base = match workout.rest {
            RestTimer::Resting { deadline } if deadline > now => deadline,
            _ => now,
        };

        let deadline = base + Duration::seconds(seconds as i64);
        workout.rest = RestTimer::Resting { deadline };
        Ok(remaining_seconds(deadline, now))
    }

    pub fn dismiss_rest_timer(&mut self) -> Result<(), SessionError> {
        let workout = self.active_mut()?;
        workout.rest = RestTimer::Idle;
        Ok(())
    }

    /// Commits the workout: one session row plus one row per completed
    /// set, in a single transaction. On storage failure the workout
    /// stays active and untouched, so the call is safe to retry.
    pub async fn complete_workout(&mut self, pool: &DB, now: DateTime<Utc>) -> Result<WorkoutReceipt> {
        let workout = self.active.as_ref().ok_or(SessionError::NoActiveWorkout)?;
        let receipt = store::commit_workout(pool, workout, now).await?;
        self.active = None;
        Ok(receipt)
    }

    /// Discards the workout without writing anything. Returns the
    /// discarded state for a parting summary.
    pub fn abandon_workout(&mut self) -> Result<ActiveWorkout, SessionError> {
        self.active.take().ok_or(SessionError::NoActiveWorkout)
    }
}
