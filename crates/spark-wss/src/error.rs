//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分两类失败：**策略未满足**（[`PolicyViolation`]）只终止当前绑定、交由断言跟踪器记录；
//!   **故障**（[`BindingFault`]）终止整次运行并向调用方传播；
//! - 两类错误使用独立类型，调用方无法把其中一种误当作另一种处理。
//!
//! ## 设计要求（What）
//! - 全部类型派生 `thiserror::Error`；
//! - 每个 [`BindingFault`] 变体映射到稳定的 `wss.*` 错误码，供告警与日志聚合使用；
//! - 内部传播统一使用 [`BindingError`]，由协调器在出口处拆分。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// 违反策略时被标记为“未满足”的断言对象。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum AssertionTarget {
    /// `sp:SymmetricBinding` 本身。
    SymmetricBinding,
    /// 签名令牌（或共享保护令牌）包装器。
    SignatureToken,
    /// 加密令牌（或共享保护令牌）包装器。
    EncryptionToken,
}

impl fmt::Display for AssertionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssertionTarget::SymmetricBinding => "SymmetricBinding",
            AssertionTarget::SignatureToken => "SignatureToken",
            AssertionTarget::EncryptionToken => "EncryptionToken",
        };
        f.write_str(name)
    }
}

/// 策略未满足的具体原因。
#[derive(Clone, Debug, Eq, PartialEq, Error, Serialize)]
pub enum ViolationReason {
    #[error("UsernameTokens not supported with Symmetric binding")]
    UsernameTokenUnsupported,
    #[error("No signature token")]
    MissingSignatureToken,
    #[error("No encryption token")]
    MissingEncryptionToken,
    /// 无法得到令牌标识：响应方找不到入站 EncryptedKey 结果，或安全上下文为空。
    #[error("No signature/encryption token id")]
    MissingTokenId,
    /// 标识已解析，但令牌仓储中不存在（或已过期）。
    #[error("token `{id}` is not available in the token store")]
    TokenUnavailable { id: String },
    /// 入站结果只给出了标识，没有可用的密钥字节。
    #[error("token `{id}` carries no key material")]
    NoKeyMaterial { id: String },
}

/// 策略未满足。
///
/// # 契约 (What)
/// - 非致命：只终止当前绑定的计划生成，不产出任何计划；
/// - 由协调器上报给 [`AssertionTracker`](crate::context::AssertionTracker)，再以
///   [`BindingOutcome::NotAsserted`](crate::coordinator::BindingOutcome::NotAsserted) 返回。
#[derive(Clone, Debug, Eq, PartialEq, Error, Serialize)]
#[error("{target} not asserted: {reason}")]
pub struct PolicyViolation {
    target: AssertionTarget,
    reason: ViolationReason,
}

impl PolicyViolation {
    pub fn new(target: AssertionTarget, reason: ViolationReason) -> Self {
        Self { target, reason }
    }

    pub fn target(&self) -> AssertionTarget {
        self.target
    }

    pub fn reason(&self) -> &ViolationReason {
        &self.reason
    }
}

/// 报文结构抽取失败，由 [`MessageParts`](crate::context::MessageParts) 实现返回。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("failed to extract {what} from message: {detail}")]
pub struct PartExtractionError {
    pub what: &'static str,
    pub detail: String,
}

/// 致命故障，终止整次运行。
///
/// # 契约 (What)
/// - 任一变体出现时不会返回任何计划（包括部分计划）；
/// - [`BindingFault::code`] 返回稳定错误码，形如 `wss.fault.*`。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BindingFault {
    /// 对称算法 URI 无法映射到已知的密钥长度。
    #[error("unsupported symmetric key algorithm `{algorithm}`")]
    UnsupportedAlgorithm { algorithm: String },

    #[error(transparent)]
    PartExtraction(#[from] PartExtractionError),

    /// 安全上下文（会话/签发令牌）查找失败。
    #[error("security context lookup failed: {detail}")]
    SecurityContext { detail: String },

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl BindingFault {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            BindingFault::UnsupportedAlgorithm { .. } => "wss.fault.unsupported_algorithm",
            BindingFault::PartExtraction(_) => "wss.fault.part_extraction",
            BindingFault::SecurityContext { .. } => "wss.fault.security_context",
            BindingFault::TokenStore(_) => "wss.fault.token_store",
        }
    }
}

/// 令牌仓储错误。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TokenStoreError {
    /// 同名且仍在有效期内的令牌已存在。
    #[error("token `{id}` is already stored")]
    DuplicateId { id: String },
}

/// 组件内部传播使用的错误：策略未满足或故障二选一。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BindingError {
    #[error(transparent)]
    Violation(#[from] PolicyViolation),
    #[error(transparent)]
    Fault(#[from] BindingFault),
}

impl BindingError {
    /// 取出策略未满足部分；故障返回 `None`。
    pub fn into_violation(self) -> Option<PolicyViolation> {
        match self {
            BindingError::Violation(violation) => Some(violation),
            BindingError::Fault(_) => None,
        }
    }
}

impl From<PartExtractionError> for BindingError {
    fn from(value: PartExtractionError) -> Self {
        BindingError::Fault(value.into())
    }
}

impl From<TokenStoreError> for BindingError {
    fn from(value: TokenStoreError) -> Self {
        BindingError::Fault(value.into())
    }
}

pub type Result<T, E = BindingError> = std::result::Result<T, E>;
