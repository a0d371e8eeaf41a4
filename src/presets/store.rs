use crate::error::{PresetError, ValidationError};
use crate::reward::{CacheKey, RewardConfiguration};
use crate::simulation::PoseSnapshot;
use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use std::path::Path;

const MAX_NAME_LEN: usize = 64;

/// A named, saved reward configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preset {
    pub name: String,
    pub reward: RewardConfiguration,
    /// RFC 3339
    pub created_at: String,
}

/// A captured joint configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseRecord {
    pub id: i64,
    pub label: Option<String>,
    pub step: u64,
    pub joint_positions: Vec<f64>,
    /// Reward context active when the pose was captured.
    pub reward_key: Option<String>,
    pub created_at: String,
}

/// Preset names are user-visible identifiers: non-empty, trimmed, bounded,
/// printable.
pub fn validate_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::PresetName("name is empty".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::PresetName(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::PresetName(
            "name contains control characters".into(),
        ));
    }
    Ok(trimmed)
}

/// SQLite-backed store for reward presets and captured poses.
#[derive(Debug, Clone)]
pub struct PresetStore {
    pool: SqlitePool,
}

impl PresetStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self, PresetError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&url).await?;
        Self::new(pool).await
    }

    /// Wrap an existing pool and create the schema.
    pub async fn new(pool: SqlitePool) -> Result<Self, PresetError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS presets (
                 name TEXT PRIMARY KEY,
                 reward TEXT NOT NULL,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS poses (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 label TEXT,
                 step INTEGER NOT NULL,
                 joint_positions TEXT NOT NULL,
                 reward_key TEXT,
                 created_at TEXT NOT NULL
             )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace the preset called `name`.
    pub async fn save(
        &self,
        name: &str,
        reward: &RewardConfiguration,
    ) -> Result<Preset, PresetError> {
        let name = validate_name(name)?;
        let encoded = serde_json::to_string(reward)?;
        let created_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO presets (name, reward, created_at) VALUES ($1, $2, $3)
             ON CONFLICT(name) DO UPDATE SET reward = excluded.reward,
                                             created_at = excluded.created_at",
        )
        .bind(name)
        .bind(&encoded)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(preset = %name, "preset saved");
        Ok(Preset {
            name: name.to_string(),
            reward: reward.clone(),
            created_at,
        })
    }

    pub async fn load(&self, name: &str) -> Result<Preset, PresetError> {
        let name = validate_name(name)?;
        let row = sqlx::query("SELECT name, reward, created_at FROM presets WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PresetError::NotFound(name.to_string()))?;
        map_preset_row(&row)
    }

    pub async fn list(&self) -> Result<Vec<String>, PresetError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM presets ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Returns whether a preset was removed.
    pub async fn delete(&self, name: &str) -> Result<bool, PresetError> {
        let name = validate_name(name)?;
        let result = sqlx::query("DELETE FROM presets WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_pose(
        &self,
        label: Option<&str>,
        pose: &PoseSnapshot,
        reward_key: Option<&CacheKey>,
    ) -> Result<i64, PresetError> {
        let joints = serde_json::to_string(&pose.joint_positions)?;
        let step = i64::try_from(pose.step).unwrap_or(i64::MAX);
        let result = sqlx::query(
            "INSERT INTO poses (label, step, joint_positions, reward_key, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(label)
        .bind(step)
        .bind(&joints)
        .bind(reward_key.map(CacheKey::as_str))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent poses first.
    pub async fn poses(&self, limit: usize) -> Result<Vec<PoseRecord>, PresetError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT id, label, step, joint_positions, reward_key, created_at
             FROM poses ORDER BY id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_pose_row).collect()
    }
}

fn map_preset_row(row: &SqliteRow) -> Result<Preset, PresetError> {
    let name: String = row.try_get("name")?;
    let raw: String = row.try_get("reward")?;
    let reward = RewardConfiguration::from_json_str(&raw).map_err(|source| {
        PresetError::Invalid {
            name: name.clone(),
            source,
        }
    })?;
    Ok(Preset {
        name,
        reward,
        created_at: row.try_get("created_at")?,
    })
}

fn map_pose_row(row: &SqliteRow) -> Result<PoseRecord, PresetError> {
    let joints: String = row.try_get("joint_positions")?;
    let step: i64 = row.try_get("step")?;
    Ok(PoseRecord {
        id: row.try_get("id")?,
        label: row.try_get("label")?,
        step: u64::try_from(step).unwrap_or_default(),
        joint_positions: serde_json::from_str(&joints)?,
        reward_key: row.try_get("reward_key")?,
        created_at: row.try_get("created_at")?,
    })
}
