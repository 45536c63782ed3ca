#![deny(unsafe_code)]

//! # spark-wss
//!
//! ## 定位与职责（Why）
//! - WS-SecurityPolicy 对称绑定（Symmetric Binding）的出站决策引擎：为每条出站报文决定
//!   保护顺序、保护令牌的获取方式，以及需要签名和加密的报文区域；
//! - 产出声明式的 [`ProtectionPlan`]，由外部密码引擎执行实际的签名与加密。
//!
//! ## 架构嵌入（Where）
//! - `coordinator` 是唯一入口，串联 `resolver`（令牌解析）、`parts`（部件选择）与 `plan`（计划构建）；
//! - `store` 提供带有效期的令牌仓储，在并发处理的多条报文之间共享；
//! - `context` 定义全部外部协作者接口，策略解析、密码运算、XML 处理均不在本 crate 内。
//!
//! ## 错误模型（Trade-offs）
//! - 策略未满足（[`PolicyViolation`]）与故障（[`BindingFault`]）是两个独立类型：
//!   前者以 [`BindingOutcome::NotAsserted`] 返回，后者以 `Err` 返回。

/// 引擎配置与 TOML 加载。
pub mod config;
/// 外部协作者接口与报文上下文。
pub mod context;
/// 对称绑定的出站入口。
pub mod coordinator;
/// 策略未满足、故障与仓储错误。
pub mod error;
/// 命名空间、元素名、算法 URI 与属性键。
pub mod names;
pub mod part;
pub mod parts;
pub mod plan;
/// 已解析的策略模型。
pub mod policy;
pub mod resolver;
pub mod store;
pub mod test_stubs;
pub mod token;

pub use config::{ConfigError, EngineConfig, TokenStoreConfig};
pub use context::{
    AssertionTracker, EngineResult, HandlerResult, InboundAction, InboundResultFeed,
    KeyProvisioner, MessageContext, MessageParts, NoInboundResults, NoSecurityContext,
    OutboundTokens, RecordedAssertions, SecurityContextLookup, TokenUsage,
};
pub use coordinator::{BindingOutcome, ProtectionOrderCoordinator};
pub use error::{
    AssertionTarget, BindingError, BindingFault, PartExtractionError, PolicyViolation,
    TokenStoreError, ViolationReason,
};
pub use part::{Modifier, PartRegion, QName, SecurePart};
pub use parts::PartSelector;
pub use plan::{
    Action, ActionPlanBuilder, EncryptionParams, KeyIdentifier, ProtectionPlan, SignatureParams,
    UnknownAction,
};
pub use policy::{
    AlgorithmSuite, ContextTokenKind, InclusionPolicy, ProtectionOrder, ReferenceRequirements,
    Role, SymmetricBinding, TokenKind, TokenPolicy, WssOptions,
};
pub use resolver::{ResolvedToken, TokenOrigin, TokenResolver};
pub use store::{Clock, InMemoryTokenStore, ManualClock, SystemClock, TokenStore};
pub use token::{EPHEMERAL_TOKEN_LIFETIME, SecretKey, SecurityToken};
