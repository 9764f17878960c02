use crate::domain::error::{AppError, Result};
use crate::domain::team::{Group, Team, TeamMember, TeamRole};
use sqlx::sqlite::SqlitePool;
use tracing::warn;

pub struct TeamRepository {
    pool: SqlitePool,
}

impl TeamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the team and the owner's membership in one transaction.
    pub async fn create_team(&self, team: &Team) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {e}")))?;

        sqlx::query(
            "INSERT INTO teams (id, name, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&team.id)
        .bind(&team.name)
        .bind(&team.owner_id)
        .bind(team.created_at)
        .bind(team.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create team: {e}")))?;

        sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, group_ids, joined_at, updated_at)
             VALUES (?, ?, ?, '[]', ?, ?)",
        )
        .bind(&team.id)
        .bind(&team.owner_id)
        .bind(TeamRole::Owner.as_str())
        .bind(team.created_at)
        .bind(team.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to add team owner: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to commit team: {e}")))?;
        Ok(())
    }

    pub async fn get_team(&self, team_id: &str) -> Result<Team> {
        let entity = sqlx::query_as::<_, TeamEntity>(
            "SELECT id, name, owner_id, created_at, updated_at FROM teams WHERE id = ?",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to fetch team: {e}")))?;

        match entity {
            Some(entity) => Ok(entity.into()),
            None => Err(AppError::NotFound(format!("Team not found: {}", team_id))),
        }
    }

    pub async fn teams_for_user(&self, user_id: &str) -> Result<Vec<Team>> {
        let entities = sqlx::query_as::<_, TeamEntity>(
            "SELECT t.id, t.name, t.owner_id, t.created_at, t.updated_at
             FROM teams t
             JOIN team_members m ON m.team_id = t.id
             WHERE m.user_id = ?
             ORDER BY t.created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list teams: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn create_group(&self, group: &Group) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_groups (id, team_id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.team_id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create group: {e}")))?;
        Ok(())
    }

    pub async fn groups_for_team(&self, team_id: &str) -> Result<Vec<Group>> {
        let entities = sqlx::query_as::<_, GroupEntity>(
            "SELECT id, team_id, name, description, created_at, updated_at
             FROM team_groups WHERE team_id = ? ORDER BY created_at ASC",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list groups: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn add_member(&self, member: &TeamMember) -> Result<()> {
        sqlx::query(
            "INSERT INTO team_members (team_id, user_id, role, group_ids, joined_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&member.team_id)
        .bind(&member.user_id)
        .bind(member.role.as_str())
        .bind(group_ids_json(&member.group_ids)?)
        .bind(member.joined_at)
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::ValidationError(
                format!("User {} is already a member of this team", member.user_id),
            ),
            e => AppError::DatabaseError(format!("Failed to add team member: {e}")),
        })?;
        Ok(())
    }

    pub async fn members_of_team(&self, team_id: &str) -> Result<Vec<TeamMember>> {
        let entities = sqlx::query_as::<_, MemberEntity>(
            "SELECT team_id, user_id, role, group_ids, joined_at
             FROM team_members WHERE team_id = ? ORDER BY joined_at ASC",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list team members: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn memberships_of_user(&self, user_id: &str) -> Result<Vec<TeamMember>> {
        let entities = sqlx::query_as::<_, MemberEntity>(
            "SELECT team_id, user_id, role, group_ids, joined_at
             FROM team_members WHERE user_id = ? ORDER BY joined_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to list memberships: {e}")))?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    pub async fn update_member_groups(
        &self,
        team_id: &str,
        user_id: &str,
        group_ids: &[String],
        now: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE team_members SET group_ids = ?, updated_at = ? WHERE team_id = ? AND user_id = ?",
        )
        .bind(group_ids_json(group_ids)?)
        .bind(now)
        .bind(team_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update member groups: {e}")))?;

        ensure_member_updated(result.rows_affected(), team_id, user_id)
    }

    pub async fn update_member_role(
        &self,
        team_id: &str,
        user_id: &str,
        role: TeamRole,
        now: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE team_members SET role = ?, updated_at = ? WHERE team_id = ? AND user_id = ?",
        )
        .bind(role.as_str())
        .bind(now)
        .bind(team_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to update member role: {e}")))?;

        ensure_member_updated(result.rows_affected(), team_id, user_id)
    }
}

fn ensure_member_updated(rows: u64, team_id: &str, user_id: &str) -> Result<()> {
    if rows == 0 {
        return Err(AppError::NotFound(format!(
            "User {} is not a member of team {}",
            user_id, team_id
        )));
    }
    Ok(())
}

fn group_ids_json(group_ids: &[String]) -> Result<String> {
    serde_json::to_string(group_ids)
        .map_err(|e| AppError::Internal(format!("Failed to encode group ids: {e}")))
}

#[derive(sqlx::FromRow)]
struct TeamEntity {
    id: String,
    name: String,
    owner_id: String,
    created_at: i64,
    updated_at: i64,
}

impl From<TeamEntity> for Team {
    fn from(entity: TeamEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            owner_id: entity.owner_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupEntity {
    id: String,
    team_id: String,
    name: String,
    description: String,
    created_at: i64,
    updated_at: i64,
}

impl From<GroupEntity> for Group {
    fn from(entity: GroupEntity) -> Self {
        Self {
            id: entity.id,
            team_id: entity.team_id,
            name: entity.name,
            description: entity.description,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MemberEntity {
    team_id: String,
    user_id: String,
    role: String,
    group_ids: String,
    joined_at: i64,
}

impl From<MemberEntity> for TeamMember {
    fn from(entity: MemberEntity) -> Self {
        let group_ids = serde_json::from_str(&entity.group_ids).unwrap_or_else(|err| {
            warn!(team_id = %entity.team_id, user_id = %entity.user_id, error = %err, "Unreadable group_ids column");
            Vec::new()
        });
        Self {
            role: entity.role.parse().unwrap_or(TeamRole::Member),
            team_id: entity.team_id,
            user_id: entity.user_id,
            group_ids,
            joined_at: entity.joined_at,
        }
    }
}
