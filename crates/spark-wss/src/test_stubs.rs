//! 协作者接口的测试桩集合。
//!
//! # 设计定位（Why）
//! - 单元测试与集成测试都需要满足 [`MessageParts`]、[`SecurityContextLookup`] 等契约，
//!   集中定义避免各测试文件重复实现，接口调整时也只需改这一处。
//!
//! # 契约说明（What）
//! - 桩对象不访问任何外部资源，返回值完全由构造参数决定；
//! - 仅用于测试或示例，生产代码不应依赖。

use std::sync::Arc;

use crate::context::{MessageParts, SecurityContextLookup};
use crate::error::PartExtractionError;
use crate::part::SecurePart;
use crate::token::SecurityToken;

/// 返回固定部件列表的报文结构。
#[derive(Clone, Debug, Default)]
pub struct StaticMessageParts {
    signed: Vec<SecurePart>,
    encrypted: Vec<SecurePart>,
}

impl StaticMessageParts {
    pub fn new(signed: Vec<SecurePart>, encrypted: Vec<SecurePart>) -> Self {
        Self { signed, encrypted }
    }
}

impl MessageParts for StaticMessageParts {
    fn signed_parts(&self) -> Result<Vec<SecurePart>, PartExtractionError> {
        Ok(self.signed.clone())
    }

    fn encrypted_parts(&self) -> Result<Vec<SecurePart>, PartExtractionError> {
        Ok(self.encrypted.clone())
    }
}

/// 抽取总是失败的报文结构。
#[derive(Clone, Debug)]
pub struct FailingMessageParts {
    detail: String,
}

impl FailingMessageParts {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    fn error(&self, what: &'static str) -> PartExtractionError {
        PartExtractionError {
            what,
            detail: self.detail.clone(),
        }
    }
}

impl MessageParts for FailingMessageParts {
    fn signed_parts(&self) -> Result<Vec<SecurePart>, PartExtractionError> {
        Err(self.error("signed parts"))
    }

    fn encrypted_parts(&self) -> Result<Vec<SecurePart>, PartExtractionError> {
        Err(self.error("encrypted parts"))
    }
}

/// 总是返回同一令牌的安全上下文。
#[derive(Clone, Debug)]
pub struct FixedSecurityContext {
    token: Arc<SecurityToken>,
}

impl FixedSecurityContext {
    pub fn new(token: SecurityToken) -> Self {
        Self {
            token: Arc::new(token),
        }
    }
}

impl SecurityContextLookup for FixedSecurityContext {
    fn security_token(&self) -> Result<Option<Arc<SecurityToken>>, String> {
        Ok(Some(Arc::clone(&self.token)))
    }
}

/// 查找总是失败的安全上下文。
#[derive(Clone, Debug)]
pub struct FailingSecurityContext {
    detail: String,
}

impl FailingSecurityContext {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

impl SecurityContextLookup for FailingSecurityContext {
    fn security_token(&self) -> Result<Option<Arc<SecurityToken>>, String> {
        Err(self.detail.clone())
    }
}
