use crate::domain::error::{AppError, Result};
use crate::domain::scenario::Scenario;
use crate::domain::user::User;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct NewTeam {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct NewGroup {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
        }
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

impl FromStr for TeamRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "owner" => Ok(TeamRole::Owner),
            "admin" => Ok(TeamRole::Admin),
            "member" => Ok(TeamRole::Member),
            other => Err(AppError::ValidationError(format!("Unknown team role: {}", other))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TeamMember {
    pub user_id: String,
    pub team_id: String,
    pub role: TeamRole,
    pub group_ids: Vec<String>,
    pub joined_at: i64,
}

/// Whether `user` may see and train on `scenario`, given all of the user's
/// team memberships.
pub fn scenario_visible_to(scenario: &Scenario, user: &User, memberships: &[TeamMember]) -> bool {
    if user.is_admin() {
        return true;
    }
    if !scenario.is_active {
        return false;
    }
    let Some(team_id) = scenario.team_id.as_deref() else {
        return scenario.visible_to_groups.is_empty()
            || memberships.iter().any(|m| in_any_group(m, &scenario.visible_to_groups));
    };
    let Some(member) = memberships.iter().find(|m| m.team_id == team_id) else {
        return false;
    };
    member.role.can_manage()
        || scenario.visible_to_groups.is_empty()
        || in_any_group(member, &scenario.visible_to_groups)
}

fn in_any_group(member: &TeamMember, groups: &[String]) -> bool {
    member.group_ids.iter().any(|id| groups.contains(id))
}
