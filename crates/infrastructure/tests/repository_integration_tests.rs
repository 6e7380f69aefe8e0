use chrono::{Duration, Utc};
use fantasy_core::config::DatabaseConfig;
use fantasy_core::models::{
    LastStatus, NewParserConfig, ParserConfigPatch, Platform, PlayerRecord, Position, RunOutcome,
    RunStatus, TeamRecord,
};
use fantasy_infrastructure::database::DatabaseManager;
use serde_json::json;

fn fpl_config(name: &str) -> NewParserConfig {
    NewParserConfig {
        name: name.to_string(),
        platform: Platform::Fpl,
        parser_type: "fpl_players".to_string(),
        schedule: Some("0 */4 * * *".to_string()),
        is_active: true,
        config: json!({}),
    }
}

#[tokio::test]
async fn test_run_lifecycle_through_manager() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let configs = db.parser_config_repository();
    let runs = db.run_log_repository();

    let config = configs.create(&fpl_config("FPL Players")).await.unwrap();
    let started_at = Utc::now();
    let run = runs.start_run(config.id, started_at).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);

    let finished = runs
        .complete_run(run.id, config.id, &RunOutcome::failed(0, 0, Some("boom".into())))
        .await
        .unwrap();
    assert_eq!(finished.status, RunStatus::Failed);
    assert!(finished.finished_at.unwrap() >= started_at);

    let stored = configs.get_by_id(config.id).await.unwrap().unwrap();
    assert_eq!(stored.last_status, LastStatus::Failed);
    assert!(stored.last_run.is_some());

    // 编辑配置不会覆盖运行状态
    let mut edited = stored.clone();
    edited.apply_patch(ParserConfigPatch {
        name: Some("FPL Players (renamed)".to_string()),
        ..Default::default()
    });
    let saved = configs.update(&edited).await.unwrap();
    assert_eq!(saved.name, "FPL Players (renamed)");
    assert_eq!(saved.last_status, LastStatus::Failed);
    assert_eq!(saved.last_run, stored.last_run);
}

#[tokio::test]
async fn test_logs_survive_config_deletion() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let configs = db.parser_config_repository();
    let runs = db.run_log_repository();

    let config = configs.create(&fpl_config("FPL Players")).await.unwrap();
    for hours_ago in [2, 1] {
        let run = runs
            .start_run(config.id, Utc::now() - Duration::hours(hours_ago))
            .await
            .unwrap();
        runs.complete_run(run.id, config.id, &RunOutcome::success(10, 0, None))
            .await
            .unwrap();
    }

    assert!(configs.delete(config.id).await.unwrap());
    assert!(configs.get_by_id(config.id).await.unwrap().is_none());
    assert_eq!(runs.list_for_config(config.id, 0, 20).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_player_upserts_are_idempotent() {
    let db = DatabaseManager::in_memory().await.unwrap();
    let players = db.player_repository();

    let team = TeamRecord {
        platform_team_id: 14,
        name: "Liverpool".to_string(),
        abbreviation: "LIV".to_string(),
        league: "Premier League".to_string(),
    };
    let record = PlayerRecord {
        platform: Platform::Fpl,
        platform_player_id: "328".to_string(),
        first_name: "Mohamed".to_string(),
        last_name: "Salah".to_string(),
        web_name: "M.Salah".to_string(),
        team_name: "Liverpool".to_string(),
        position: Position::Mid,
        status: "a".to_string(),
        current_cost: 12.5,
        ownership_percent: 45.1,
        form: 8.2,
        total_points: 200,
        event_points: 12,
    };

    for _ in 0..3 {
        players.upsert_team(&team).await.unwrap();
        players.upsert_player(&record).await.unwrap();
    }

    assert_eq!(players.count_profiles(Platform::Fpl).await.unwrap(), 1);
    let profile = players.find_profile(Platform::Fpl, "328").await.unwrap().unwrap();
    assert_eq!(players.price_history(profile.id).await.unwrap().len(), 1);
}

fn squad_player(index: usize) -> PlayerRecord {
    PlayerRecord {
        platform: Platform::Fpl,
        platform_player_id: index.to_string(),
        first_name: format!("Player{index}"),
        last_name: "Squad".to_string(),
        web_name: format!("P{index}"),
        team_name: "Liverpool".to_string(),
        position: Position::Def,
        status: "a".to_string(),
        current_cost: 4.5,
        ownership_percent: 1.5,
        form: 2.0,
        total_points: 10,
        event_points: 1,
    }
}

#[tokio::test]
async fn test_overlapping_player_syncs_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("parsers.db").display()),
        max_connections: 4,
        min_connections: 1,
        connection_timeout_seconds: 10,
    };
    let db = DatabaseManager::new(&config).await.unwrap();
    db.run_migrations().await.unwrap();
    let players = db.player_repository();

    players
        .upsert_team(&TeamRecord {
            platform_team_id: 12,
            name: "Liverpool".to_string(),
            abbreviation: "LIV".to_string(),
            league: "Premier League".to_string(),
        })
        .await
        .unwrap();

    // 同一配置被重复触发时，多个运行并发写入同一批球员
    let mut runs = Vec::new();
    for _ in 0..4 {
        let players = players.clone();
        runs.push(tokio::spawn(async move {
            let mut errors = Vec::new();
            for index in 0..200 {
                if let Err(e) = players.upsert_player(&squad_player(index)).await {
                    errors.push(e.to_string());
                }
            }
            errors
        }));
    }

    for run in runs {
        let errors = run.await.unwrap();
        assert!(errors.is_empty(), "并发写入失败: {:?}", errors.first());
    }

    assert_eq!(players.count_profiles(Platform::Fpl).await.unwrap(), 200);
    let profile = players.find_profile(Platform::Fpl, "42").await.unwrap().unwrap();
    assert_eq!(players.price_history(profile.id).await.unwrap().len(), 1);
    db.close().await;
}
