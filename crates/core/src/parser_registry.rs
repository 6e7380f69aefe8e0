use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{traits::ParserAdapter, FantasyError, FantasyResult};

/// 解析器注册表
///
/// 进程启动时构建一次，之后只读；通过 `Arc<ParserRegistry>` 显式注入到执行器和API。
/// 新增数据源只需要在构建时多注册一个适配器，分发逻辑不需要修改。
pub struct ParserRegistry {
    adapters: HashMap<String, Arc<dyn ParserAdapter>>,
}

impl ParserRegistry {
    pub fn builder() -> ParserRegistryBuilder {
        ParserRegistryBuilder::default()
    }

    /// 按解析器类型查找适配器
    pub fn resolve(&self, parser_type: &str) -> FantasyResult<Arc<dyn ParserAdapter>> {
        self.adapters
            .get(parser_type)
            .cloned()
            .ok_or_else(|| FantasyError::unknown_parser_type(parser_type))
    }

    /// 所有已注册的类型，按字母排序
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.adapters.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn contains(&self, parser_type: &str) -> bool {
        self.adapters.contains_key(parser_type)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}

#[derive(Default)]
pub struct ParserRegistryBuilder {
    adapters: HashMap<String, Arc<dyn ParserAdapter>>,
}

impl ParserRegistryBuilder {
    /// 以适配器自身的 `parser_type` 为键注册
    pub fn register(self, adapter: Arc<dyn ParserAdapter>) -> Self {
        let key = adapter.parser_type().to_string();
        self.register_as(key, adapter)
    }

    pub fn register_as(mut self, key: impl Into<String>, adapter: Arc<dyn ParserAdapter>) -> Self {
        let key = key.into();
        debug!("注册解析器: {} ({})", key, adapter.platform());
        if self.adapters.insert(key.clone(), adapter).is_some() {
            warn!("解析器类型 {} 被重复注册，使用最后一次注册的实现", key);
        }
        self
    }

    pub fn build(self) -> ParserRegistry {
        ParserRegistry {
            adapters: self.adapters,
        }
    }
}
