//! 安全部件选择：按角色与绑定开关组装签名列表和加密列表。
//!
//! # 契约 (What)
//! - 列表顺序即追加顺序，允许重复；
//! - 只会因报文结构抽取失败而出错，错误原样向上传播；
//! - 签名确认标记在一次运行中至多追加一次。

use tracing::debug;

use crate::context::MessageContext;
use crate::error::PartExtractionError;
use crate::part::SecurePart;
use crate::policy::{InclusionPolicy, Role, SymmetricBinding};

/// 一次运行内的部件选择器。
#[derive(Debug)]
pub struct PartSelector<'b> {
    binding: &'b SymmetricBinding,
    role: Role,
    confirmation_added: bool,
}

impl<'b> PartSelector<'b> {
    pub fn new(binding: &'b SymmetricBinding, role: Role) -> Self {
        Self {
            binding,
            role,
            confirmation_added: false,
        }
    }

    /// 签名列表：基础部件，按需追加 `wsu:Timestamp` 与 `wsse:BinarySecurityToken`。
    pub fn signed_parts(
        &self,
        ctx: &MessageContext<'_>,
    ) -> Result<Vec<SecurePart>, PartExtractionError> {
        let mut parts = ctx.parts().signed_parts()?;
        if self.binding.includes_timestamp() {
            parts.push(SecurePart::timestamp());
        }
        if self.protects_token_reference() {
            parts.push(SecurePart::binary_security_token());
        }
        Ok(parts)
    }

    /// 加密列表：基础部件，`encrypt_signature` 时追加 `ds:Signature`。
    pub fn encrypted_parts(
        &self,
        ctx: &MessageContext<'_>,
    ) -> Result<Vec<SecurePart>, PartExtractionError> {
        let mut parts = ctx.parts().encrypted_parts()?;
        if self.binding.encrypts_signature() {
            parts.push(SecurePart::signature_element());
        }
        Ok(parts)
    }

    /// 请求方追加声明的支撑令牌部件；响应方不做任何事。
    pub fn add_supporting_parts(&self, ctx: &MessageContext<'_>, parts: &mut Vec<SecurePart>) {
        if !self.role.is_requestor() {
            return;
        }
        parts.extend(ctx.supporting_parts().iter().cloned());
    }

    /// 响应方追加签名确认标记，返回本次是否追加。
    pub fn add_signature_confirmation(&mut self, parts: &mut Vec<SecurePart>) -> bool {
        if self.role.is_requestor()
            || self.confirmation_added
            || !self.binding.wss().require_signature_confirmation
        {
            return false;
        }
        parts.push(SecurePart::signature_confirmation());
        self.confirmation_added = true;
        debug!("added signature confirmation to signed parts");
        true
    }

    fn protects_token_reference(&self) -> bool {
        if !self.binding.protects_tokens() {
            return false;
        }
        self.binding.signature_token().is_some_and(|token| {
            token.kind().is_asymmetric() && token.inclusion() != InclusionPolicy::Never
        })
    }
}
