//! 引擎配置。
//!
//! # 契约 (What)
//! - 所有字段都有默认值，空配置即可运行；
//! - 未知字段会被拒绝，避免拼写错误被静默忽略；
//! - 通过 [`EngineConfig::from_toml_str`] 从 TOML 文本加载。
//!
//! ```toml
//! encryption_user = "service-b"
//! token_id_prefix = "EK-"
//!
//! [token_store]
//! evict_expired_on_lookup = true
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 生成的临时令牌标识默认前缀。
pub const DEFAULT_TOKEN_ID_PREFIX: &str = "EK-";

/// 决策引擎配置。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// 报文上下文未提供加密身份覆盖时使用的回退值。
    pub encryption_user: Option<String>,
    /// 请求方生成临时令牌时使用的标识前缀。
    pub token_id_prefix: String,
    pub token_store: TokenStoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encryption_user: None,
            token_id_prefix: DEFAULT_TOKEN_ID_PREFIX.to_owned(),
            token_store: TokenStoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// 解析 TOML 配置文本。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // XML ID 必须以字母或下划线开头。
        let valid_start = self
            .token_id_prefix
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start {
            return Err(ConfigError::InvalidTokenIdPrefix {
                prefix: self.token_id_prefix.clone(),
            });
        }
        Ok(())
    }
}

/// 内存令牌仓储配置。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenStoreConfig {
    /// 查找命中过期条目时是否顺带移除。
    pub evict_expired_on_lookup: bool,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            evict_expired_on_lookup: true,
        }
    }
}

/// 配置加载错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed engine configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("token id prefix `{prefix}` must start with an ASCII letter or `_`")]
    InvalidTokenIdPrefix { prefix: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, EngineConfig::default());
        assert!(config.token_store.evict_expired_on_lookup);
    }

    #[test]
    fn overrides_are_applied() {
        let config = EngineConfig::from_toml_str(
            r#"
            encryption_user = "service-b"
            token_id_prefix = "_tok-"

            [token_store]
            evict_expired_on_lookup = false
            "#,
        )
        .expect("valid config");
        assert_eq!(config.encryption_user.as_deref(), Some("service-b"));
        assert_eq!(config.token_id_prefix, "_tok-");
        assert!(!config.token_store.evict_expired_on_lookup);
    }

    #[test]
    fn unknown_fields_and_bad_prefix_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("lifetime_ms = 10"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str(r#"token_id_prefix = "1-""#),
            Err(ConfigError::InvalidTokenIdPrefix { .. })
        ));
    }
}
