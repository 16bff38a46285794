use clap::{Args, Parser, Subcommand};

use crate::types::WeightUnit;

#[derive(Parser)]
#[command(name = "ironlog", version, about = "CLI workout tracker")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Active workout commands
    #[command(subcommand, visible_alias = "s")]
    Session(SessionCmd),

    /// Workout template management
    #[command(subcommand, visible_alias = "t")]
    Template(TemplateCmd),

    /// Split management
    #[command(subcommand)]
    Split(SplitCmd),

    /// Exercise catalog management
    #[command(subcommand, visible_alias = "ex")]
    Exercise(ExerciseCmd),

    /// Show progression status for tracked exercises
    Status {
        /// Restrict to one template (index or name)
        #[arg(short, long)]
        template: Option<String>,

        /// Restrict to a single session id
        #[arg(long)]
        session: Option<String>,
    },

    /// Show streak, weekly activity and a suggested workout
    #[command(visible_alias = "dash")]
    Dashboard,

    /// Show completed sessions in a calendar view
    #[command(visible_alias = "cal")]
    Calendar {
        /// Year to show (defaults to current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Month to show (1-12, defaults to current month)
        #[arg(short, long)]
        month: Option<u32>,
    },

    /// View or edit ironlog config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Start a workout from a template, or freeform with --label
    #[command(visible_alias = "s")]
    Start(StartArgs),

    /// Show the active workout, timers included
    #[command(visible_alias = "i")]
    Show,

    /// Re-render the active workout once per second
    #[command(visible_alias = "w")]
    Watch,

    /// Log a completed set - Usage: session log EXERCISE REPS WEIGHT
    #[command(visible_alias = "l")]
    #[command(override_usage = "session log <EXERCISE> <REPS> <WEIGHT>")]
    Log {
        /// Exercise index or name within the active workout
        #[arg(value_name = "EXERCISE")]
        exercise: String,

        /// Number of reps
        #[arg(value_name = "REPS")]
        reps: u32,

        /// Weight (use "bw" for bodyweight)
        #[arg(value_name = "WEIGHT")]
        weight: String,

        /// Specific set number (defaults to the next pending set)
        #[arg(long, short = 's')]
        set: Option<u32>,

        /// Unit the weight was entered in (defaults to the effective unit)
        #[arg(long, short = 'u')]
        unit: Option<WeightUnit>,
    },

    /// Add an exercise to the active workout
    AddEx {
        /// Catalog exercise index or name
        exercise: String,

        /// Number of planned sets
        #[arg(default_value = "3")]
        sets: u32,
    },

    /// Remove an exercise (discards its logged sets)
    RmEx {
        /// Exercise index or name within the active workout
        exercise: String,
    },

    /// Append a pending set to an exercise
    AddSet {
        /// Exercise index or name within the active workout
        exercise: String,
    },

    /// Remove a pending set and renumber the rest
    RmSet {
        /// Exercise index or name within the active workout
        exercise: String,

        /// Set number to remove
        set: u32,
    },

    /// Set or clear per-exercise rest/unit overrides
    Override {
        /// Exercise index or name within the active workout
        exercise: String,

        /// Rest seconds override for this exercise
        #[arg(long)]
        rest: Option<u32>,

        /// Weight unit override for this exercise
        #[arg(long)]
        unit: Option<WeightUnit>,

        /// Drop all overrides for this exercise
        #[arg(long)]
        clear: bool,
    },

    /// Rest timer control
    #[command(subcommand, visible_alias = "r")]
    Rest(RestCmd),

    /// Finish the workout and write it to the database
    #[command(visible_alias = "f")]
    Finish,

    /// Discard the workout without writing anything
    Abandon,

    /// List completed sessions, or show one from a specific date
    #[command(visible_alias = "h")]
    History {
        /// Date in DD-MM-YYYY format
        #[arg(short, long)]
        date: Option<String>,

        /// How many sessions to list
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Subcommand)]
pub enum RestCmd {
    /// Start the countdown (defaults to the effective rest duration)
    Start {
        /// Seconds to count down from
        seconds: Option<u32>,
    },

    /// Add seconds to the countdown
    Add { seconds: u32 },

    /// Dismiss the countdown
    Skip,

    /// Show the remaining rest
    Show,
}

#[derive(Args)]
pub struct StartArgs {
    /// Template index or name (omit for a freeform workout)
    pub template: Option<String>,

    /// Label for a freeform workout
    #[arg(short, long)]
    pub label: Option<String>,
}

#[derive(Subcommand)]
pub enum TemplateCmd {
    /// Import splits and their templates from TOML files
    #[command(visible_alias = "i")]
    Import { files: Vec<String> },

    /// List templates
    #[command(visible_alias = "l")]
    List,

    /// Show a single template in detail
    #[command(visible_alias = "s")]
    Show {
        /// Template index (from `t list`) or exact name
        template: String,
    },

    /// Replace a template's day and exercise list from a TOML file
    Edit {
        /// Template index or exact name
        template: String,

        /// TOML file with a [template] block
        file: String,
    },

    /// Delete a template and its exercise slots
    #[command(visible_alias = "d")]
    Delete {
        /// Template index or exact name
        template: String,
    },
}

#[derive(Subcommand)]
pub enum SplitCmd {
    /// List splits with their templates
    #[command(visible_alias = "l")]
    List,

    /// Delete a split and every template under it
    #[command(visible_alias = "d")]
    Delete {
        /// Split index or exact name
        split: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExerciseCmd {
    /// Add a new exercise
    #[command(visible_alias = "a")]
    Add {
        /// Exercise name
        name: String,

        /// Primary muscle group
        #[arg(short, long)]
        muscle: String,

        /// Exercise description
        #[arg(short, long)]
        desc: Option<String>,
    },

    /// Import exercises from a TOML file
    #[command(visible_alias = "i")]
    Import {
        /// Path to TOML file
        file: String,
    },

    /// List all exercises
    #[command(visible_alias = "l")]
    List {
        /// Filter by muscle group
        #[arg(short, long)]
        muscle: Option<String>,
    },

    /// Show exercise details and recent history
    #[command(visible_alias = "s")]
    Show {
        /// Exercise index or name
        exercise: String,

        /// Draw the per-session weight history as a graph
        #[arg(short, long)]
        graph: bool,
    },

    /// Delete an exercise
    #[command(visible_alias = "d")]
    Delete {
        /// Exercise index or name
        exercise: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}
