use async_trait::async_trait;
use chrono::Utc;
use fantasy_core::{
    models::{
        OwnershipRecord, Platform, PlayerProfile, PlayerRecord, Position, PriceHistoryEntry,
        TeamRecord,
    },
    traits::{PlayerRepository, PlayerUpsert},
    FantasyResult,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, instrument};

use super::decode_text;
use crate::error_handling::RepositoryOperation;
use crate::repo_context;

const PROFILE_COLUMNS: &str = "id, player_id, platform, platform_player_id, custom_name, team_id, \
                               player_position, current_cost, ownership_percent, is_active, \
                               status, form, total_points, event_points";

/// 价格比较的精度，FPL 价格以 0.1 为单位
const COST_EPSILON: f64 = 1e-6;

pub struct SqlitePlayerRepository {
    pool: SqlitePool,
}

impl SqlitePlayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_profile(row: &SqliteRow) -> FantasyResult<PlayerProfile> {
        let platform: String = row.try_get("platform")?;
        let position: Option<String> = row.try_get("player_position")?;
        Ok(PlayerProfile {
            id: row.try_get("id")?,
            player_id: row.try_get("player_id")?,
            platform: decode_text::<Platform>(&platform, "platform")?,
            platform_player_id: row.try_get("platform_player_id")?,
            custom_name: row.try_get("custom_name")?,
            team_id: row.try_get("team_id")?,
            position: position
                .as_deref()
                .map(|p| decode_text::<Position>(p, "player_position"))
                .transpose()?,
            current_cost: row.try_get("current_cost")?,
            ownership_percent: row.try_get("ownership_percent")?,
            is_active: row.try_get("is_active")?,
            status: row.try_get("status")?,
            form: row.try_get("form")?,
            total_points: row.try_get("total_points")?,
            event_points: row.try_get("event_points")?,
        })
    }

    fn row_to_price_entry(row: &SqliteRow) -> FantasyResult<PriceHistoryEntry> {
        Ok(PriceHistoryEntry {
            id: row.try_get("id")?,
            player_profile_id: row.try_get("player_profile_id")?,
            cost: row.try_get("cost")?,
            ownership_percent: row.try_get("ownership_percent")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

#[async_trait]
impl PlayerRepository for SqlitePlayerRepository {
    #[instrument(skip(self, team), fields(team = %team.name))]
    async fn upsert_team(&self, team: &TeamRecord) -> FantasyResult<i64> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO teams (name, abbreviation, league, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET abbreviation = excluded.abbreviation, \
             league = excluded.league, updated_at = excluded.updated_at \
             RETURNING id",
        )
        .bind(&team.name)
        .bind(&team.abbreviation)
        .bind(&team.league)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            repo_context!(RepositoryOperation::Upsert, "球队", detail = team.name.as_str())
                .database_error(e)
        })?;

        Ok(row.try_get("id")?)
    }

    #[instrument(skip(self, player), fields(
        platform = %player.platform,
        platform_player_id = %player.platform_player_id,
    ))]
    async fn upsert_player(&self, player: &PlayerRecord) -> FantasyResult<PlayerUpsert> {
        let context = repo_context!(
            RepositoryOperation::Upsert,
            "球员",
            detail = player.web_name.as_str()
        );
        let now = Utc::now();
        // 第一条语句必须是写操作，先读后写的事务在并发写入时会直接得到 SQLITE_BUSY
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| context.database_error(e))?;

        let player_id: i64 = sqlx::query(
            "INSERT INTO players (first_name, last_name, web_name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(first_name, last_name) DO UPDATE SET web_name = excluded.web_name, \
             updated_at = excluded.updated_at \
             RETURNING id",
        )
        .bind(&player.first_name)
        .bind(&player.last_name)
        .bind(&player.web_name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| context.database_error(e))?
        .try_get("id")?;

        let team_id: Option<i64> = sqlx::query("SELECT id FROM teams WHERE name = ?")
            .bind(&player.team_name)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| context.database_error(e))?
            .map(|row| row.try_get("id"))
            .transpose()?;

        let profile_id: i64 = sqlx::query(
            "INSERT INTO player_platform_profiles (player_id, platform, platform_player_id, \
             custom_name, team_id, player_position, current_cost, ownership_percent, is_active, \
             status, form, total_points, event_points, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(platform, platform_player_id) DO UPDATE SET \
             player_id = excluded.player_id, custom_name = excluded.custom_name, \
             team_id = excluded.team_id, player_position = excluded.player_position, \
             current_cost = excluded.current_cost, ownership_percent = excluded.ownership_percent, \
             is_active = 1, status = excluded.status, form = excluded.form, \
             total_points = excluded.total_points, event_points = excluded.event_points, \
             updated_at = excluded.updated_at \
             RETURNING id",
        )
        .bind(player_id)
        .bind(player.platform.as_str())
        .bind(&player.platform_player_id)
        .bind(&player.web_name)
        .bind(team_id)
        .bind(player.position.as_str())
        .bind(player.current_cost)
        .bind(player.ownership_percent)
        .bind(&player.status)
        .bind(player.form)
        .bind(player.total_points)
        .bind(player.event_points)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| context.database_error(e))?
        .try_get("id")?;

        // 与最近一条价格历史比较；持有率可能被 fpl_ownership 单独更新过，档案行不能作为基准
        let latest = sqlx::query(
            "SELECT cost, ownership_percent FROM price_history WHERE player_profile_id = ? \
             ORDER BY recorded_at DESC, id DESC LIMIT 1",
        )
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| context.database_error(e))?;

        let price_changed = match &latest {
            None => true,
            Some(row) => {
                let cost: f64 = row.try_get("cost")?;
                let ownership: Option<f64> = row.try_get("ownership_percent")?;
                (cost - player.current_cost).abs() > COST_EPSILON
                    || ownership.map_or(true, |o| (o - player.ownership_percent).abs() > COST_EPSILON)
            }
        };

        if price_changed {
            sqlx::query(
                "INSERT INTO price_history (player_profile_id, cost, ownership_percent, recorded_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(profile_id)
            .bind(player.current_cost)
            .bind(player.ownership_percent)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| context.database_error(e))?;
        }

        tx.commit().await.map_err(|e| context.database_error(e))?;

        debug!(
            "球员 {} 写入完成 (档案 {}, 价格记录: {})",
            player.web_name, profile_id, price_changed
        );
        Ok(PlayerUpsert {
            profile_id,
            price_recorded: price_changed,
        })
    }

    #[instrument(skip(self, record), fields(platform_player_id = %record.platform_player_id))]
    async fn update_ownership(&self, record: &OwnershipRecord) -> FantasyResult<bool> {
        let result = sqlx::query(
            "UPDATE player_platform_profiles SET ownership_percent = ?, updated_at = ? \
             WHERE platform = ? AND platform_player_id = ?",
        )
        .bind(record.ownership_percent)
        .bind(Utc::now())
        .bind(record.platform.as_str())
        .bind(&record.platform_player_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            repo_context!(
                RepositoryOperation::Update,
                "球员档案",
                detail = record.platform_player_id.as_str()
            )
            .database_error(e)
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_profile(
        &self,
        platform: Platform,
        platform_player_id: &str,
    ) -> FantasyResult<Option<PlayerProfile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM player_platform_profiles \
             WHERE platform = ? AND platform_player_id = ?"
        );
        let row = sqlx::query(&sql)
            .bind(platform.as_str())
            .bind(platform_player_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                repo_context!(RepositoryOperation::Read, "球员档案", detail = platform_player_id)
                    .database_error(e)
            })?;

        row.as_ref().map(Self::row_to_profile).transpose()
    }

    async fn count_profiles(&self, platform: Platform) -> FantasyResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM player_platform_profiles WHERE platform = ?")
            .bind(platform.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| repo_context!(RepositoryOperation::Query, "球员档案").database_error(e))?;

        Ok(row.try_get("total")?)
    }

    async fn price_history(&self, profile_id: i64) -> FantasyResult<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, player_profile_id, cost, ownership_percent, recorded_at FROM price_history \
             WHERE player_profile_id = ? ORDER BY id DESC",
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            repo_context!(RepositoryOperation::Query, "价格历史", id = profile_id).database_error(e)
        })?;

        rows.iter().map(Self::row_to_price_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;

    fn team() -> TeamRecord {
        TeamRecord {
            platform_team_id: 1,
            name: "Arsenal".to_string(),
            abbreviation: "ARS".to_string(),
            league: "Premier League".to_string(),
        }
    }

    fn player(cost: f64, ownership: f64) -> PlayerRecord {
        PlayerRecord {
            platform: Platform::Fpl,
            platform_player_id: "7".to_string(),
            first_name: "Bukayo".to_string(),
            last_name: "Saka".to_string(),
            web_name: "Saka".to_string(),
            team_name: "Arsenal".to_string(),
            position: Position::Mid,
            status: "a".to_string(),
            current_cost: cost,
            ownership_percent: ownership,
            form: 6.5,
            total_points: 120,
            event_points: 8,
        }
    }

    async fn setup() -> SqlitePlayerRepository {
        let db = DatabaseManager::in_memory().await.unwrap();
        SqlitePlayerRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_upsert_team_is_idempotent() {
        let repo = setup().await;
        let first = repo.upsert_team(&team()).await.unwrap();
        let second = repo.upsert_team(&team()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_upsert_player_links_team_and_records_price() {
        let repo = setup().await;
        let team_id = repo.upsert_team(&team()).await.unwrap();

        let first = repo.upsert_player(&player(9.0, 35.2)).await.unwrap();
        assert!(first.price_recorded);

        let profile = repo.find_profile(Platform::Fpl, "7").await.unwrap().unwrap();
        assert_eq!(profile.team_id, Some(team_id));
        assert_eq!(profile.position, Some(Position::Mid));
        assert_eq!(profile.custom_name, "Saka");
        assert_eq!(profile.current_cost, 9.0);

        // 价格和持有率都没变，不追加历史
        let unchanged = repo.upsert_player(&player(9.0, 35.2)).await.unwrap();
        assert_eq!(unchanged.profile_id, first.profile_id);
        assert!(!unchanged.price_recorded);

        let changed = repo.upsert_player(&player(9.1, 35.2)).await.unwrap();
        assert!(changed.price_recorded);

        let history = repo.price_history(first.profile_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].cost, 9.1);
        assert_eq!(repo.count_profiles(Platform::Fpl).await.unwrap(), 1);
        assert_eq!(repo.count_profiles(Platform::Sorare).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ownership_move_recorded_on_next_player_sync() {
        let repo = setup().await;
        let first = repo.upsert_player(&player(5.5, 10.0)).await.unwrap();
        assert!(first.price_recorded);

        repo.update_ownership(&OwnershipRecord {
            platform: Platform::Fpl,
            platform_player_id: "7".to_string(),
            ownership_percent: 20.0,
        })
        .await
        .unwrap();

        // 档案已是 20.0，但最近的历史仍是 10.0
        let second = repo.upsert_player(&player(5.5, 20.0)).await.unwrap();
        assert!(second.price_recorded);

        let third = repo.upsert_player(&player(5.5, 20.0)).await.unwrap();
        assert!(!third.price_recorded);

        let history = repo.price_history(first.profile_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].ownership_percent, Some(20.0));
        assert_eq!(history[1].ownership_percent, Some(10.0));
    }

    #[tokio::test]
    async fn test_update_ownership_only_existing_profiles() {
        let repo = setup().await;
        repo.upsert_player(&player(5.5, 10.0)).await.unwrap();

        let updated = repo
            .update_ownership(&OwnershipRecord {
                platform: Platform::Fpl,
                platform_player_id: "7".to_string(),
                ownership_percent: 12.5,
            })
            .await
            .unwrap();
        assert!(updated);
        let profile = repo.find_profile(Platform::Fpl, "7").await.unwrap().unwrap();
        assert_eq!(profile.ownership_percent, Some(12.5));
        // 球队尚未写入时档案的球队为空
        assert_eq!(profile.team_id, None);

        let missing = repo
            .update_ownership(&OwnershipRecord {
                platform: Platform::Fpl,
                platform_player_id: "404".to_string(),
                ownership_percent: 1.0,
            })
            .await
            .unwrap();
        assert!(!missing);
    }
}
