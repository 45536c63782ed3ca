//! # ProtectionOrderCoordinator：对称绑定的出站入口
//!
//! ## 核心意图（Why）
//! - 每条出站报文执行一次：读取绑定的保护顺序，解析一次保护令牌（两个阶段共享同一密钥），
//!   再按顺序组装签名阶段与加密阶段；
//! - 策略未满足与故障在出口处分流：前者上报断言跟踪器并以 [`BindingOutcome::NotAsserted`]
//!   返回，后者以 `Err` 中止运行。
//!
//! ## 行为契约（What）
//! - 两种保护顺序恰好执行其一，计划的第一个签名/加密动作与声明的顺序一致；
//! - 任何失败都不会产出部分计划；
//! - 请求方追加支撑令牌部件，响应方追加签名确认标记（至多一次）。
//!
//! ## 使用方式（How）
//! ```ignore
//! let coordinator = ProtectionOrderCoordinator::new(store, clock, EngineConfig::default());
//! match coordinator.run(&binding, Role::Requestor, &ctx)? {
//!     BindingOutcome::Planned(plan) => engine.apply(plan.to_properties()),
//!     BindingOutcome::NotAsserted(violation) => reject(violation),
//! }
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::context::MessageContext;
use crate::error::{
    AssertionTarget, BindingError, BindingFault, PolicyViolation, Result, ViolationReason,
};
use crate::parts::PartSelector;
use crate::plan::{ActionPlanBuilder, ProtectionPlan};
use crate::policy::{ProtectionOrder, Role, SymmetricBinding};
use crate::resolver::TokenResolver;
use crate::store::{Clock, TokenStore};

/// 一次运行的结果：计划，或未满足的策略断言。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BindingOutcome {
    Planned(ProtectionPlan),
    NotAsserted(PolicyViolation),
}

impl BindingOutcome {
    pub fn plan(&self) -> Option<&ProtectionPlan> {
        match self {
            BindingOutcome::Planned(plan) => Some(plan),
            BindingOutcome::NotAsserted(_) => None,
        }
    }

    pub fn violation(&self) -> Option<&PolicyViolation> {
        match self {
            BindingOutcome::Planned(_) => None,
            BindingOutcome::NotAsserted(violation) => Some(violation),
        }
    }

    pub fn into_plan(self) -> Option<ProtectionPlan> {
        match self {
            BindingOutcome::Planned(plan) => Some(plan),
            BindingOutcome::NotAsserted(_) => None,
        }
    }
}

/// 对称绑定的保护顺序协调器。
///
/// 实例无内部可变状态，可在线程间共享并发处理多条报文；令牌仓储是唯一的共享资源。
#[derive(Debug)]
pub struct ProtectionOrderCoordinator {
    resolver: TokenResolver,
    config: EngineConfig,
}

impl ProtectionOrderCoordinator {
    pub fn new(store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let resolver = TokenResolver::new(store, clock, config.token_id_prefix.clone());
        Self { resolver, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 为一条出站报文生成保护计划。
    pub fn run(
        &self,
        binding: &SymmetricBinding,
        role: Role,
        ctx: &MessageContext<'_>,
    ) -> std::result::Result<BindingOutcome, BindingFault> {
        self.run_with(binding, role, ctx, ActionPlanBuilder::new())
    }

    /// 在预置的构建器上继续生成计划，用于同一报文上已有先行动作的场景。
    pub fn run_with(
        &self,
        binding: &SymmetricBinding,
        role: Role,
        ctx: &MessageContext<'_>,
        builder: ActionPlanBuilder,
    ) -> std::result::Result<BindingOutcome, BindingFault> {
        let order = binding.protection_order();
        let result = match order {
            ProtectionOrder::EncryptBeforeSigning => {
                self.encrypt_before_signing(binding, role, ctx, builder)
            }
            ProtectionOrder::SignBeforeEncrypting => {
                self.sign_before_encrypting(binding, role, ctx, builder)
            }
        };

        match result {
            Ok(plan) => {
                info!(
                    ?order,
                    ?role,
                    action = %plan.action_sequence(),
                    token_id = plan.token_id().unwrap_or_default(),
                    "symmetric binding plan built"
                );
                Ok(BindingOutcome::Planned(plan))
            }
            Err(BindingError::Violation(violation)) => {
                warn!(
                    ?order,
                    ?role,
                    target = %violation.target(),
                    reason = %violation.reason(),
                    "policy not asserted"
                );
                ctx.assertions().not_asserted(&violation);
                Ok(BindingOutcome::NotAsserted(violation))
            }
            Err(BindingError::Fault(fault)) => {
                warn!(
                    ?order,
                    ?role,
                    code = fault.code(),
                    error = %fault,
                    "symmetric binding aborted"
                );
                Err(fault)
            }
        }
    }

    fn encrypt_before_signing(
        &self,
        binding: &SymmetricBinding,
        role: Role,
        ctx: &MessageContext<'_>,
        mut builder: ActionPlanBuilder,
    ) -> Result<ProtectionPlan> {
        let encryption_token = binding.encryption_token().ok_or_else(|| {
            PolicyViolation::new(
                AssertionTarget::SymmetricBinding,
                ViolationReason::MissingEncryptionToken,
            )
        })?;
        let resolved = self.resolver.resolve(
            encryption_token,
            binding.algorithm_suite(),
            role,
            ctx,
            AssertionTarget::EncryptionToken,
        )?;
        builder.bind_token(&resolved);

        let mut selector = PartSelector::new(binding, role);
        // 签名列表先于加密确定，加密后的已签名头部仍然被覆盖。
        let mut encrypted = selector.encrypted_parts(ctx)?;
        let mut signed = selector.signed_parts(ctx)?;
        if encrypted.is_empty() {
            return Ok(builder.build());
        }

        if role.is_requestor() {
            selector.add_supporting_parts(ctx, &mut encrypted);
        } else {
            selector.add_signature_confirmation(&mut signed);
        }
        builder.add_encryption_phase(
            &encrypted,
            encryption_token,
            binding,
            self.encryption_user(ctx),
        );

        if !role.is_requestor() {
            selector.add_signature_confirmation(&mut signed);
        }
        if !signed.is_empty() {
            let signature_token = binding.signature_token().ok_or_else(|| {
                PolicyViolation::new(
                    AssertionTarget::SymmetricBinding,
                    ViolationReason::MissingSignatureToken,
                )
            })?;
            builder.add_signature_phase(&signed, signature_token, binding, role, &resolved);
        }
        Ok(builder.build())
    }

    fn sign_before_encrypting(
        &self,
        binding: &SymmetricBinding,
        role: Role,
        ctx: &MessageContext<'_>,
        mut builder: ActionPlanBuilder,
    ) -> Result<ProtectionPlan> {
        let signature_token = binding.signature_token().ok_or_else(|| {
            PolicyViolation::new(
                AssertionTarget::SymmetricBinding,
                ViolationReason::MissingSignatureToken,
            )
        })?;
        let resolved = self.resolver.resolve(
            signature_token,
            binding.algorithm_suite(),
            role,
            ctx,
            AssertionTarget::SignatureToken,
        )?;
        builder.bind_token(&resolved);

        let mut selector = PartSelector::new(binding, role);
        let mut signed = selector.signed_parts(ctx)?;
        if !role.is_requestor() {
            selector.add_signature_confirmation(&mut signed);
        }
        builder.add_signature_phase(&signed, signature_token, binding, role, &resolved);

        let mut encrypted = selector.encrypted_parts(ctx)?;
        selector.add_supporting_parts(ctx, &mut encrypted);
        if !encrypted.is_empty() {
            let encryption_token = binding.encryption_token().ok_or_else(|| {
                PolicyViolation::new(
                    AssertionTarget::SymmetricBinding,
                    ViolationReason::MissingEncryptionToken,
                )
            })?;
            builder.add_encryption_phase(
                &encrypted,
                encryption_token,
                binding,
                self.encryption_user(ctx),
            );
        }
        Ok(builder.build())
    }

    /// 报文上下文的覆盖值优先，其次是配置中的回退值。
    fn encryption_user(&self, ctx: &MessageContext<'_>) -> Option<String> {
        ctx.encryption_user()
            .map(str::to_owned)
            .or_else(|| self.config.encryption_user.clone())
    }
}
