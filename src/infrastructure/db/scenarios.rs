use crate::domain::error::{AppError, Result};
use crate::domain::scenario::{Difficulty, MetricDocument, Scenario, ScenarioDraft, ScenarioMeta};
use sqlx::sqlite::SqlitePool;
use tracing::warn;

const SELECT_COLUMNS: &str = "SELECT id, team_id, title, description, difficulty, time_limit, max_questions,
        customer_background, situation, success_metrics, is_active, visible_to_groups,
        created_by, created_at, updated_at
     FROM scenarios";

pub struct ScenarioRepository {
    pool: SqlitePool,
}

impl ScenarioRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, scenario: &Scenario) -> Result<()> {
        sqlx::query(
            "INSERT INTO scenarios (id, team_id, title, description, difficulty, time_limit, max_questions,
                customer_background, situation, success_metrics, is_active, visible_to_groups,
                created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&scenario.id)
        .bind(&scenario.team_id)
        .bind(&scenario.title)
        .bind(&scenario.description)
        .bind(scenario.difficulty.as_str())
        .bind(scenario.time_limit)
        .bind(scenario.max_questions)
        .bind(&scenario.customer_background)
        .bind(&scenario.situation)
        .bind(to_json(&scenario.success_metrics)?)
        .bind(if scenario.is_active { 1 } else { 0 })
        .bind(to_json(&scenario.visible_to_groups)?)
        .bind(&scenario.created_by)
        .bind(scenario.created_at)
        .bind(scenario.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to insert scenario: {e}")))?;

        Ok(())
    }

    pub async fn get(&self, scenario_id: &str) -> Result<Scenario> {
        let entity = sqlx::query_as::<_, ScenarioEntity>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(scenario_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to fetch scenario: {e}")))?;

        match entity {
            Some(entity) => Ok(entity.into()),
            None => Err(AppError::NotFound(format!(
                "Scenario not found: {}",
                scenario_id
            ))),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Scenario>> {
        let entities = sqlx::query_as::<_, ScenarioEntity>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list scenarios: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn list_active(&self) -> Result<Vec<Scenario>> {
        let entities = sqlx::query_as::<_, ScenarioEntity>(&format!(
            "{SELECT_COLUMNS} WHERE is_active = 1 ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list active scenarios: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn update(&self, scenario: &Scenario) -> Result<()> {
        let result = sqlx::query(
            "UPDATE scenarios SET team_id = ?, title = ?, description = ?, difficulty = ?, time_limit = ?,
                max_questions = ?, customer_background = ?, situation = ?, success_metrics = ?,
                is_active = ?, visible_to_groups = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&scenario.team_id)
        .bind(&scenario.title)
        .bind(&scenario.description)
        .bind(scenario.difficulty.as_str())
        .bind(scenario.time_limit)
        .bind(scenario.max_questions)
        .bind(&scenario.customer_background)
        .bind(&scenario.situation)
        .bind(to_json(&scenario.success_metrics)?)
        .bind(if scenario.is_active { 1 } else { 0 })
        .bind(to_json(&scenario.visible_to_groups)?)
        .bind(scenario.updated_at)
        .bind(&scenario.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update scenario: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Scenario not found: {}",
                scenario.id
            )));
        }
        Ok(())
    }

    pub async fn set_active(&self, scenario_id: &str, is_active: bool, updated_at: i64) -> Result<()> {
        let result = sqlx::query("UPDATE scenarios SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(if is_active { 1 } else { 0 })
            .bind(updated_at)
            .bind(scenario_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to toggle scenario: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Scenario not found: {}",
                scenario_id
            )));
        }
        Ok(())
    }

    pub async fn delete(&self, scenario_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM scenarios WHERE id = ?")
            .bind(scenario_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to delete scenario: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Scenario not found: {}",
                scenario_id
            )));
        }
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Failed to encode column: {e}")))
}

#[derive(sqlx::FromRow)]
struct ScenarioEntity {
    id: String,
    team_id: Option<String>,
    title: String,
    description: String,
    difficulty: String,
    time_limit: Option<i64>,
    max_questions: Option<i64>,
    customer_background: Option<String>,
    situation: Option<String>,
    success_metrics: String,
    is_active: i64,
    visible_to_groups: String,
    created_by: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<ScenarioEntity> for Scenario {
    fn from(entity: ScenarioEntity) -> Self {
        let success_metrics: Vec<MetricDocument> = serde_json::from_str(&entity.success_metrics)
            .unwrap_or_else(|err| {
                warn!(scenario_id = %entity.id, error = %err, "Unreadable success_metrics column");
                Vec::new()
            });
        let visible_to_groups: Vec<String> = serde_json::from_str(&entity.visible_to_groups)
            .unwrap_or_else(|err| {
                warn!(scenario_id = %entity.id, error = %err, "Unreadable visible_to_groups column");
                Vec::new()
            });

        let draft = ScenarioDraft {
            title: entity.title,
            description: entity.description,
            difficulty: entity.difficulty.parse().unwrap_or(Difficulty::Beginner),
            time_limit: entity.time_limit,
            max_questions: entity.max_questions,
            customer_background: entity.customer_background,
            situation: entity.situation,
            success_metrics,
            is_active: entity.is_active != 0,
            team_id: entity.team_id,
            visible_to_groups,
        };

        draft.into_scenario(ScenarioMeta {
            id: entity.id,
            created_by: entity.created_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
