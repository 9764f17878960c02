use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_TIME_LIMIT_MINUTES: i64 = 30;
pub const DEFAULT_MAX_QUESTIONS: i64 = 10;
pub const DEFAULT_METRIC_WEIGHT: i64 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(AppError::ValidationError(format!(
                "Unknown difficulty: {}",
                other
            ))),
        }
    }
}

/// Rubric item rendered into prompts. Weight and criteria are prose only;
/// nothing aggregates them into the score.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SuccessMetric {
    pub id: String,
    pub name: String,
    pub weight: i64,
    pub description: String,
    pub criteria: Vec<String>,
    pub key_phrases: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub team_id: Option<String>,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub time_limit: i64,
    pub max_questions: i64,
    pub customer_background: String,
    pub situation: String,
    pub success_metrics: Vec<SuccessMetric>,
    pub is_active: bool,
    pub visible_to_groups: Vec<String>,
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A success metric as stored or submitted. Early documents kept bare
/// metric names instead of objects.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MetricDocument {
    Name(String),
    Fields(MetricFields),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MetricFields {
    pub id: Option<String>,
    pub name: Option<String>,
    pub weight: Option<i64>,
    pub description: Option<String>,
    pub criteria: Option<Vec<String>>,
    #[serde(alias = "keyPhrases")]
    pub key_phrases: Option<Vec<String>>,
}

impl MetricDocument {
    pub fn normalize(self) -> SuccessMetric {
        match self {
            MetricDocument::Name(name) => SuccessMetric {
                id: new_id(),
                description: name.clone(),
                name,
                weight: DEFAULT_METRIC_WEIGHT,
                criteria: Vec::new(),
                key_phrases: Vec::new(),
            },
            MetricDocument::Fields(fields) => SuccessMetric {
                id: non_empty(fields.id).unwrap_or_else(new_id),
                name: fields.name.unwrap_or_default(),
                weight: fields
                    .weight
                    .filter(|weight| *weight != 0)
                    .unwrap_or(DEFAULT_METRIC_WEIGHT),
                description: fields.description.unwrap_or_default(),
                criteria: fields.criteria.unwrap_or_default(),
                key_phrases: fields.key_phrases.unwrap_or_default(),
            },
        }
    }
}

impl From<&SuccessMetric> for MetricDocument {
    fn from(metric: &SuccessMetric) -> Self {
        MetricDocument::Fields(MetricFields {
            id: Some(metric.id.clone()),
            name: Some(metric.name.clone()),
            weight: Some(metric.weight),
            description: Some(metric.description.clone()),
            criteria: Some(metric.criteria.clone()),
            key_phrases: Some(metric.key_phrases.clone()),
        })
    }
}

/// Identity and bookkeeping fields that never come from a payload.
#[derive(Debug, Clone)]
pub struct ScenarioMeta {
    pub id: String,
    pub created_by: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Scenario fields with every optional part still optional. Both database
/// rows and API payloads pass through `into_scenario`, which is the only
/// place defaults are filled in.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct ScenarioDraft {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[validate(range(min = 1, max = 480))]
    pub time_limit: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub max_questions: Option<i64>,
    pub customer_background: Option<String>,
    pub situation: Option<String>,
    #[serde(default)]
    pub success_metrics: Vec<MetricDocument>,
    #[serde(default)]
    pub is_active: bool,
    pub team_id: Option<String>,
    #[serde(default)]
    pub visible_to_groups: Vec<String>,
}

impl ScenarioDraft {
    pub fn into_scenario(self, meta: ScenarioMeta) -> Scenario {
        Scenario {
            id: meta.id,
            team_id: non_empty(self.team_id),
            title: self.title,
            description: self.description,
            difficulty: self.difficulty,
            time_limit: positive_or(self.time_limit, DEFAULT_TIME_LIMIT_MINUTES),
            max_questions: positive_or(self.max_questions, DEFAULT_MAX_QUESTIONS),
            customer_background: self.customer_background.unwrap_or_default(),
            situation: self.situation.unwrap_or_default(),
            success_metrics: self
                .success_metrics
                .into_iter()
                .map(MetricDocument::normalize)
                .collect(),
            is_active: self.is_active,
            visible_to_groups: self
                .visible_to_groups
                .into_iter()
                .filter(|group| !group.trim().is_empty())
                .collect(),
            created_by: meta.created_by,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}

impl From<&Scenario> for ScenarioDraft {
    fn from(scenario: &Scenario) -> Self {
        Self {
            title: scenario.title.clone(),
            description: scenario.description.clone(),
            difficulty: scenario.difficulty,
            time_limit: Some(scenario.time_limit),
            max_questions: Some(scenario.max_questions),
            customer_background: Some(scenario.customer_background.clone()),
            situation: Some(scenario.situation.clone()),
            success_metrics: scenario.success_metrics.iter().map(Into::into).collect(),
            is_active: scenario.is_active,
            team_id: scenario.team_id.clone(),
            visible_to_groups: scenario.visible_to_groups.clone(),
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct ScenarioPatch {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 480))]
    pub time_limit: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub max_questions: Option<i64>,
    pub customer_background: Option<String>,
    pub situation: Option<String>,
    pub success_metrics: Option<Vec<MetricDocument>>,
    pub is_active: Option<bool>,
    pub team_id: Option<String>,
    pub visible_to_groups: Option<Vec<String>>,
}

impl ScenarioPatch {
    pub fn apply_to(self, current: &Scenario) -> ScenarioDraft {
        let mut draft = ScenarioDraft::from(current);
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(difficulty) = self.difficulty {
            draft.difficulty = difficulty;
        }
        if self.time_limit.is_some() {
            draft.time_limit = self.time_limit;
        }
        if self.max_questions.is_some() {
            draft.max_questions = self.max_questions;
        }
        if self.customer_background.is_some() {
            draft.customer_background = self.customer_background;
        }
        if self.situation.is_some() {
            draft.situation = self.situation;
        }
        if let Some(metrics) = self.success_metrics {
            draft.success_metrics = metrics;
        }
        if let Some(is_active) = self.is_active {
            draft.is_active = is_active;
        }
        if self.team_id.is_some() {
            draft.team_id = self.team_id;
        }
        if let Some(groups) = self.visible_to_groups {
            draft.visible_to_groups = groups;
        }
        draft
    }
}

/// Rejects scenarios whose metrics would render as nameless prompt entries.
pub fn ensure_metric_names(scenario: &Scenario) -> Result<()> {
    if let Some(position) = scenario
        .success_metrics
        .iter()
        .position(|metric| metric.name.trim().is_empty())
    {
        return Err(AppError::ValidationError(format!(
            "Success metric #{} has no name",
            position + 1
        )));
    }
    Ok(())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive_or(value: Option<i64>, default: i64) -> i64 {
    value.filter(|v| *v > 0).unwrap_or(default)
}
