//! # 临时密钥仓储（EphemeralKeyStore）
//!
//! ## 核心意图（Why）
//! - 将不透明的令牌标识与对称密钥材料及其有效期关联起来，供同一交换的签名、加密阶段
//!   以及外部密码引擎按标识取回；
//! - 仓储在并发处理的多条报文之间共享，调用方无需额外同步。
//!
//! ## 行为契约（What）
//! - [`TokenStore::add`]：原子插入；若同名且未过期的令牌已存在，返回
//!   [`TokenStoreError::DuplicateId`]；已过期的同名条目会被替换；
//! - [`TokenStore::get`]：返回 `Arc` 快照，永远不会观察到构造一半的令牌；过期令牌不可见；
//! - 过期检查在使用时进行，不依赖后台任务；[`InMemoryTokenStore::purge_expired`] 供宿主按需清扫。
//!
//! ## 风险提示（Trade-offs）
//! - `DashMap` 分片锁只在单次调用内持有，不跨越阶段边界。

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::TokenStoreConfig;
use crate::error::TokenStoreError;
use crate::token::SecurityToken;

/// 可注入的墙钟时间来源。
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// 直接读取系统时间的时钟。
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// 手动推进的时钟，测试中用于跨越令牌有效期。
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}

/// 令牌仓储接口，作为协作者显式注入。
pub trait TokenStore: Send + Sync {
    /// 按标识取回未过期的令牌。
    fn get(&self, id: &str) -> Option<Arc<SecurityToken>>;

    /// 插入令牌并返回共享句柄。
    fn add(&self, token: SecurityToken) -> Result<Arc<SecurityToken>, TokenStoreError>;
}

/// 基于 `DashMap` 的内存令牌仓储。
pub struct InMemoryTokenStore {
    tokens: DashMap<Arc<str>, Arc<SecurityToken>>,
    clock: Arc<dyn Clock>,
    config: TokenStoreConfig,
}

impl InMemoryTokenStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, TokenStoreConfig::default())
    }

    pub fn with_config(clock: Arc<dyn Clock>, config: TokenStoreConfig) -> Self {
        Self {
            tokens: DashMap::new(),
            clock,
            config,
        }
    }

    /// 移除全部已过期条目，返回移除数量。
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired_at(now));
        let purged = before.saturating_sub(self.tokens.len());
        if purged > 0 {
            debug!(purged, "purged expired tokens");
        }
        purged
    }

    /// 当前条目数量（含尚未清扫的过期条目）。
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, id: &str) -> Option<Arc<SecurityToken>> {
        let now = self.clock.now();
        let token = self.tokens.get(id).map(|entry| Arc::clone(entry.value()))?;
        if !token.is_expired_at(now) {
            return Some(token);
        }
        if self.config.evict_expired_on_lookup {
            self.tokens
                .remove_if(id, |_, stored| stored.is_expired_at(now));
            debug!(token_id = id, "evicted expired token on lookup");
        }
        None
    }

    fn add(&self, token: SecurityToken) -> Result<Arc<SecurityToken>, TokenStoreError> {
        let now = self.clock.now();
        let token = Arc::new(token);
        match self.tokens.entry(Arc::from(token.id())) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired_at(now) {
                    return Err(TokenStoreError::DuplicateId {
                        id: token.id().to_owned(),
                    });
                }
                occupied.insert(Arc::clone(&token));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&token));
            }
        }
        Ok(token)
    }
}

impl std::fmt::Debug for InMemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTokenStore")
            .field("tokens", &self.tokens.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
