use std::sync::Arc;

use fantasy_core::{
    config::UpstreamConfig,
    traits::{ParserAdapter, PlayerRepository},
    FantasyResult, ParserRegistry,
};
use tracing::info;

use crate::adapters::{FplClient, FplOwnershipAdapter, FplPlayersAdapter};

/// 构建进程内唯一的解析器注册表
///
/// 新增数据源时在这里追加一个适配器即可。
pub fn build_parser_registry(
    upstream: &UpstreamConfig,
    players: Arc<dyn PlayerRepository>,
) -> FantasyResult<ParserRegistry> {
    let fpl = FplClient::new(upstream)?;

    let adapters: Vec<Arc<dyn ParserAdapter>> = vec![
        Arc::new(FplPlayersAdapter::new(fpl.clone(), players.clone())),
        Arc::new(FplOwnershipAdapter::new(fpl, players)),
    ];

    let registry = adapters
        .into_iter()
        .fold(ParserRegistry::builder(), |builder, adapter| builder.register(adapter))
        .build();

    info!("解析器注册完成: {:?}", registry.list_types());
    Ok(registry)
}
