use crate::domain::scenario::{Scenario, SuccessMetric};

/// Prompt material derived from a scenario. Building it is pure: the same
/// scenario always renders to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioContext {
    pub background: String,
    pub situation: String,
    pub metrics: String,
}

impl ScenarioContext {
    pub fn build(scenario: &Scenario) -> Self {
        Self {
            background: scenario.customer_background.clone(),
            situation: scenario.situation.clone(),
            metrics: render_metrics(&scenario.success_metrics),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Company Context:\n{}\n\nCurrent Situation:\n{}\n\nSuccess Metrics:\n{}",
            self.background, self.situation, self.metrics
        )
    }
}

fn render_metrics(metrics: &[SuccessMetric]) -> String {
    metrics
        .iter()
        .map(|metric| {
            format!(
                "{} (Weight: {}):\n{}",
                metric.name, metric.weight, metric.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
