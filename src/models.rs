use serde::Deserialize;

/// A split file: one [split] block with its [[split.workouts]].
#[derive(Debug, Deserialize)]
pub struct SplitFile {
    pub split: SplitDef,
}

#[derive(Debug, Deserialize)]
pub struct SplitDef {
    pub name: String,
    #[serde(default)]
    pub workouts: Vec<TemplateDef>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateDef {
    pub name: String,
    /// Day name ("monday") or omitted for unscheduled templates.
    pub day: Option<String>,
    #[serde(default)]
    pub exercises: Vec<TemplateExerciseDef>,
}

/// A standalone template definition, used by replace-all edits.
#[derive(Debug, Deserialize)]
pub struct TemplateFile {
    pub template: TemplateDef,
}

#[derive(Debug, Deserialize)]
pub struct TemplateExerciseDef {
    pub name: String,
    pub sets: u32,
    /// Rep prescription, either "8-12" or a single "10".
    pub reps: String,
}

#[derive(Debug, Deserialize)]
pub struct ExerciseFile {
    pub exercises: Vec<ExerciseDef>,
}

#[derive(Debug, Deserialize)]
pub struct ExerciseDef {
    pub name: String,
    pub muscle: String,
    pub description: Option<String>,
}
