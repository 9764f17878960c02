use crate::domain::error::{AppError, Result};
use crate::domain::team::{Group, NewGroup, NewTeam, Team, TeamMember, TeamRole};
use crate::domain::user::User;
use crate::infrastructure::db::{TeamRepository, UserRepository};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

pub struct TeamUseCase {
    teams: Arc<TeamRepository>,
    users: Arc<UserRepository>,
}

impl TeamUseCase {
    pub fn new(teams: Arc<TeamRepository>, users: Arc<UserRepository>) -> Self {
        Self { teams, users }
    }

    pub async fn create_team(&self, caller: &User, mut request: NewTeam) -> Result<Team> {
        request.name = request.name.trim().to_string();
        request.validate()?;
        let name = request.name;
        let now = chrono::Utc::now().timestamp_millis();
        let team = Team {
            id: Uuid::new_v4().to_string(),
            name,
            owner_id: caller.id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.teams.create_team(&team).await?;
        info!(team_id = %team.id, owner_id = %caller.id, "Created team");
        Ok(team)
    }

    pub async fn my_teams(&self, caller: &User) -> Result<Vec<Team>> {
        self.teams.teams_for_user(&caller.id).await
    }

    pub async fn create_group(
        &self,
        caller: &User,
        team_id: &str,
        mut request: NewGroup,
    ) -> Result<Group> {
        self.require_manager(caller, team_id).await?;
        request.name = request.name.trim().to_string();
        request.validate()?;
        let NewGroup { name, description } = request;
        let now = chrono::Utc::now().timestamp_millis();
        let group = Group {
            id: Uuid::new_v4().to_string(),
            team_id: team_id.to_string(),
            name,
            description: description.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        self.teams.create_group(&group).await?;
        Ok(group)
    }

    pub async fn groups(&self, caller: &User, team_id: &str) -> Result<Vec<Group>> {
        self.require_member(caller, team_id).await?;
        self.teams.groups_for_team(team_id).await
    }

    /// Adds a registered user to the team. Ownership is never granted here.
    pub async fn add_member(
        &self,
        caller: &User,
        team_id: &str,
        user_id: &str,
        role: TeamRole,
    ) -> Result<TeamMember> {
        self.require_manager(caller, team_id).await?;
        if role == TeamRole::Owner {
            return Err(AppError::ValidationError(
                "A team has exactly one owner.".to_string(),
            ));
        }
        self.users.get(user_id).await?;

        let member = TeamMember {
            user_id: user_id.to_string(),
            team_id: team_id.to_string(),
            role,
            group_ids: Vec::new(),
            joined_at: chrono::Utc::now().timestamp_millis(),
        };
        self.teams.add_member(&member).await?;
        info!(team_id, user_id, role = role.as_str(), "Added team member");
        Ok(member)
    }

    pub async fn members(&self, caller: &User, team_id: &str) -> Result<Vec<TeamMember>> {
        self.require_member(caller, team_id).await?;
        self.teams.members_of_team(team_id).await
    }

    /// Replaces the member's group assignment. Every id must name a group of
    /// this team.
    pub async fn set_member_groups(
        &self,
        caller: &User,
        team_id: &str,
        user_id: &str,
        group_ids: Vec<String>,
    ) -> Result<()> {
        self.require_manager(caller, team_id).await?;
        let known = self.teams.groups_for_team(team_id).await?;
        if let Some(unknown) = group_ids
            .iter()
            .find(|id| !known.iter().any(|group| &group.id == *id))
        {
            return Err(AppError::ValidationError(format!(
                "Group {} does not belong to team {}",
                unknown, team_id
            )));
        }
        let mut group_ids = group_ids;
        group_ids.sort();
        group_ids.dedup();

        let now = chrono::Utc::now().timestamp_millis();
        self.teams
            .update_member_groups(team_id, user_id, &group_ids, now)
            .await
    }

    pub async fn set_member_role(
        &self,
        caller: &User,
        team_id: &str,
        user_id: &str,
        role: TeamRole,
    ) -> Result<()> {
        self.require_manager(caller, team_id).await?;
        let team = self.teams.get_team(team_id).await?;
        if role == TeamRole::Owner || team.owner_id == user_id {
            return Err(AppError::ValidationError(
                "Team ownership cannot be changed.".to_string(),
            ));
        }
        let now = chrono::Utc::now().timestamp_millis();
        self.teams
            .update_member_role(team_id, user_id, role, now)
            .await
    }

    pub async fn memberships(&self, user_id: &str) -> Result<Vec<TeamMember>> {
        self.teams.memberships_of_user(user_id).await
    }

    async fn membership(&self, caller: &User, team_id: &str) -> Result<Option<TeamMember>> {
        self.teams.get_team(team_id).await?;
        let memberships = self.teams.memberships_of_user(&caller.id).await?;
        Ok(memberships.into_iter().find(|m| m.team_id == team_id))
    }

    async fn require_member(&self, caller: &User, team_id: &str) -> Result<()> {
        let membership = self.membership(caller, team_id).await?;
        if caller.is_admin() || membership.is_some() {
            return Ok(());
        }
        Err(AppError::Forbidden(format!(
            "Not a member of team {}",
            team_id
        )))
    }

    async fn require_manager(&self, caller: &User, team_id: &str) -> Result<()> {
        let membership = self.membership(caller, team_id).await?;
        if caller.is_admin() || membership.map(|m| m.role.can_manage()).unwrap_or(false) {
            return Ok(());
        }
        Err(AppError::Forbidden(format!(
            "Team owner or admin role required for team {}",
            team_id
        )))
    }
}
