use crate::application::use_cases::users::require_admin;
use crate::domain::error::{AppError, Result};
use crate::domain::scenario::{ensure_metric_names, Scenario, ScenarioDraft, ScenarioMeta, ScenarioPatch};
use crate::domain::team::scenario_visible_to;
use crate::domain::user::User;
use crate::infrastructure::db::{ScenarioRepository, TeamRepository};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct ScenarioUseCase {
    scenarios: Arc<ScenarioRepository>,
    teams: Arc<TeamRepository>,
}

impl ScenarioUseCase {
    pub fn new(scenarios: Arc<ScenarioRepository>, teams: Arc<TeamRepository>) -> Self {
        Self { scenarios, teams }
    }

    pub async fn create(&self, caller: &User, draft: ScenarioDraft) -> Result<Scenario> {
        require_admin(caller)?;
        draft.validate()?;

        let now = chrono::Utc::now().timestamp_millis();
        let scenario = draft.into_scenario(ScenarioMeta {
            id: Uuid::new_v4().to_string(),
            created_by: Some(caller.id.clone()),
            created_at: now,
            updated_at: now,
        });
        ensure_metric_names(&scenario)?;
        self.ensure_team_exists(&scenario).await?;

        self.scenarios.insert(&scenario).await?;
        info!(scenario_id = %scenario.id, created_by = %caller.id, "Created scenario");
        Ok(scenario)
    }

    pub async fn update(&self, caller: &User, scenario_id: &str, patch: ScenarioPatch) -> Result<Scenario> {
        require_admin(caller)?;
        patch.validate()?;

        let current = self.scenarios.get(scenario_id).await?;
        let scenario = patch.apply_to(&current).into_scenario(ScenarioMeta {
            id: current.id.clone(),
            created_by: current.created_by.clone(),
            created_at: current.created_at,
            updated_at: chrono::Utc::now().timestamp_millis(),
        });
        ensure_metric_names(&scenario)?;
        self.ensure_team_exists(&scenario).await?;

        self.scenarios.update(&scenario).await?;
        info!(scenario_id = %scenario.id, updated_by = %caller.id, "Updated scenario");
        Ok(scenario)
    }

    pub async fn delete(&self, caller: &User, scenario_id: &str) -> Result<()> {
        require_admin(caller)?;
        self.scenarios.delete(scenario_id).await?;
        info!(scenario_id, deleted_by = %caller.id, "Deleted scenario");
        Ok(())
    }

    /// Flips `is_active` and returns the stored result.
    pub async fn toggle(&self, caller: &User, scenario_id: &str) -> Result<Scenario> {
        require_admin(caller)?;
        let current = self.scenarios.get(scenario_id).await?;
        let now = chrono::Utc::now().timestamp_millis();
        self.scenarios
            .set_active(scenario_id, !current.is_active, now)
            .await?;
        self.scenarios.get(scenario_id).await
    }

    pub async fn list_all(&self, caller: &User) -> Result<Vec<Scenario>> {
        require_admin(caller)?;
        self.scenarios.list_all().await
    }

    pub async fn list_visible(&self, caller: &User) -> Result<Vec<Scenario>> {
        if caller.is_admin() {
            return self.scenarios.list_all().await;
        }
        let memberships = self.teams.memberships_of_user(&caller.id).await?;
        let scenarios = self.scenarios.list_active().await?;
        Ok(scenarios
            .into_iter()
            .filter(|s| scenario_visible_to(s, caller, &memberships))
            .collect())
    }

    /// Hidden scenarios read as missing so their ids are not disclosed.
    pub async fn get_visible(&self, caller: &User, scenario_id: &str) -> Result<Scenario> {
        let scenario = self.scenarios.get(scenario_id).await?;
        let memberships = if caller.is_admin() {
            Vec::new()
        } else {
            self.teams.memberships_of_user(&caller.id).await?
        };
        if scenario_visible_to(&scenario, caller, &memberships) {
            Ok(scenario)
        } else {
            Err(AppError::NotFound(format!(
                "Scenario not found: {}",
                scenario_id
            )))
        }
    }

    async fn ensure_team_exists(&self, scenario: &Scenario) -> Result<()> {
        if let Some(team_id) = &scenario.team_id {
            self.teams.get_team(team_id).await.map_err(|err| match err {
                AppError::NotFound(message) => AppError::ValidationError(message),
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scenario::{MetricDocument, MetricFields};
    use crate::domain::team::{Team, TeamMember, TeamRole};
    use crate::domain::user::UserRole;
    use crate::infrastructure::db::connection::memory_pool;

    fn user(id: &str, role: UserRole) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: id.to_string(),
            company: None,
            role,
            created_at: 0,
            last_active: 0,
        }
    }

    async fn use_case() -> (ScenarioUseCase, Arc<TeamRepository>) {
        let pool = memory_pool().await;
        let teams = Arc::new(TeamRepository::new(pool.clone()));
        (
            ScenarioUseCase::new(Arc::new(ScenarioRepository::new(pool)), teams.clone()),
            teams,
        )
    }

    fn draft(title: &str) -> ScenarioDraft {
        ScenarioDraft {
            title: title.to_string(),
            customer_background: Some("Logistics firm".to_string()),
            situation: Some("Renewal at risk".to_string()),
            success_metrics: vec![MetricDocument::Fields(MetricFields {
                name: Some("Discovery".to_string()),
                weight: Some(2),
                ..Default::default()
            })],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_starts_inactive_and_fills_defaults() {
        let (scenarios, _) = use_case().await;
        let admin = user("admin", UserRole::Admin);

        let created = scenarios.create(&admin, draft("Renewal")).await.unwrap();
        assert!(!created.is_active);
        assert_eq!(created.time_limit, 30);
        assert_eq!(created.created_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_create_requires_admin_and_valid_payload() {
        let (scenarios, _) = use_case().await;
        let trainee = user("rep", UserRole::User);
        let admin = user("admin", UserRole::Admin);

        assert!(matches!(
            scenarios.create(&trainee, draft("x")).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            scenarios.create(&admin, draft("")).await,
            Err(AppError::ValidationError(_))
        ));

        let mut too_long = draft("x");
        too_long.time_limit = Some(481);
        assert!(matches!(
            scenarios.create(&admin, too_long).await,
            Err(AppError::ValidationError(_))
        ));

        let mut nameless = draft("x");
        nameless.success_metrics = vec![MetricDocument::Fields(MetricFields::default())];
        assert!(matches!(
            scenarios.create(&admin, nameless).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_team_rejected() {
        let (scenarios, _) = use_case().await;
        let mut d = draft("x");
        d.team_id = Some("missing".to_string());
        assert!(matches!(
            scenarios.create(&user("admin", UserRole::Admin), d).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_toggle_controls_trainee_visibility() {
        let (scenarios, _) = use_case().await;
        let admin = user("admin", UserRole::Admin);
        let trainee = user("rep", UserRole::User);
        let created = scenarios.create(&admin, draft("Renewal")).await.unwrap();

        assert!(scenarios.list_visible(&trainee).await.unwrap().is_empty());
        assert!(matches!(
            scenarios.get_visible(&trainee, &created.id).await,
            Err(AppError::NotFound(_))
        ));

        let toggled = scenarios.toggle(&admin, &created.id).await.unwrap();
        assert!(toggled.is_active);
        assert_eq!(scenarios.list_visible(&trainee).await.unwrap().len(), 1);
        assert!(scenarios.get_visible(&trainee, &created.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_team_scenario_visible_to_group_members_only() {
        let (scenarios, teams) = use_case().await;
        let admin = user("admin", UserRole::Admin);
        teams
            .create_team(&Team {
                id: "t1".to_string(),
                name: "East".to_string(),
                owner_id: "admin".to_string(),
                created_at: 0,
                updated_at: 0,
            })
            .await
            .unwrap();
        for (id, groups) in [("in", vec!["g1".to_string()]), ("out", vec![])] {
            teams
                .add_member(&TeamMember {
                    user_id: id.to_string(),
                    team_id: "t1".to_string(),
                    role: TeamRole::Member,
                    group_ids: groups,
                    joined_at: 0,
                })
                .await
                .unwrap();
        }

        let mut d = draft("Team only");
        d.team_id = Some("t1".to_string());
        d.visible_to_groups = vec!["g1".to_string()];
        d.is_active = true;
        let created = scenarios.create(&admin, d).await.unwrap();

        let inside = user("in", UserRole::User);
        let outside = user("out", UserRole::User);
        assert!(scenarios.get_visible(&inside, &created.id).await.is_ok());
        assert!(scenarios.list_visible(&outside).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_patches_and_delete_removes() {
        let (scenarios, _) = use_case().await;
        let admin = user("admin", UserRole::Admin);
        let created = scenarios.create(&admin, draft("Renewal")).await.unwrap();

        let updated = scenarios
            .update(
                &admin,
                &created.id,
                ScenarioPatch {
                    max_questions: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.max_questions, 4);
        assert_eq!(updated.title, "Renewal");
        assert_eq!(updated.success_metrics, created.success_metrics);

        scenarios.delete(&admin, &created.id).await.unwrap();
        assert!(scenarios.list_all(&admin).await.unwrap().is_empty());
    }
}
