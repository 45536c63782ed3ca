//! 报文上下文与外部协作者接口。
//!
//! 协调器在一次运行中只通过这里定义的窄接口访问外部世界：
//! - [`MessageParts`]：报文结构抽取出的基础签名/加密部件；
//! - [`InboundResultFeed`]：当前交换中入站密码引擎的处理结果；
//! - [`SecurityContextLookup`]：会话/签发令牌的安全上下文；
//! - [`KeyProvisioner`]：把解析出的密钥交给外部密码引擎；
//! - [`AssertionTracker`]：记录未满足的策略断言。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{PartExtractionError, PolicyViolation};
use crate::part::SecurePart;
use crate::token::SecurityToken;

/// 报文结构抽取接口。
pub trait MessageParts {
    /// 策略声明需要签名的基础部件（`sp:SignedParts`/`sp:SignedElements`）。
    fn signed_parts(&self) -> Result<Vec<SecurePart>, PartExtractionError>;

    /// 策略声明需要加密的基础部件（`sp:EncryptedParts`/`sp:EncryptedElements`）。
    fn encrypted_parts(&self) -> Result<Vec<SecurePart>, PartExtractionError>;
}

/// 入站密码引擎结果的动作标签。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InboundAction {
    /// 密钥加密（EncryptedKey）处理结果。
    Encryption,
    Signature,
    Timestamp,
    UsernameToken,
    SignatureConfirmation,
    Other(u32),
}

/// 单条入站引擎结果。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineResult {
    action: InboundAction,
    id: Option<String>,
    secret: Option<Vec<u8>>,
    encrypted_ephemeral_key: Option<Vec<u8>>,
}

impl EngineResult {
    pub fn new(action: InboundAction) -> Self {
        Self {
            action,
            id: None,
            secret: None,
            encrypted_ephemeral_key: None,
        }
    }

    /// 入站 EncryptedKey 结果：标识、解出的对称密钥与被包裹的密钥字节。
    pub fn encrypted_key(
        id: impl Into<String>,
        secret: Vec<u8>,
        encrypted_ephemeral_key: Vec<u8>,
    ) -> Self {
        Self::new(InboundAction::Encryption)
            .with_id(id)
            .with_secret(secret)
            .with_encrypted_ephemeral_key(encrypted_ephemeral_key)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_secret(mut self, secret: Vec<u8>) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn with_encrypted_ephemeral_key(mut self, bytes: Vec<u8>) -> Self {
        self.encrypted_ephemeral_key = Some(bytes);
        self
    }

    pub fn action(&self) -> InboundAction {
        self.action
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref()
    }

    pub fn encrypted_ephemeral_key(&self) -> Option<&[u8]> {
        self.encrypted_ephemeral_key.as_deref()
    }
}

/// 一次入站处理（一个安全头）产生的结果集合，顺序即处理顺序。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HandlerResult {
    results: Vec<EngineResult>,
}

impl HandlerResult {
    pub fn new(results: Vec<EngineResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[EngineResult] {
        &self.results
    }
}

/// 当前交换的入站结果来源，只读。
pub trait InboundResultFeed {
    fn current_exchange(&self) -> &[HandlerResult];
}

impl InboundResultFeed for [HandlerResult] {
    fn current_exchange(&self) -> &[HandlerResult] {
        self
    }
}

impl InboundResultFeed for Vec<HandlerResult> {
    fn current_exchange(&self) -> &[HandlerResult] {
        self
    }
}

/// 没有任何入站结果（例如请求方首条报文）。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInboundResults;

impl InboundResultFeed for NoInboundResults {
    fn current_exchange(&self) -> &[HandlerResult] {
        &[]
    }
}

/// 会话/签发令牌的安全上下文查找，以当前交换为键。
pub trait SecurityContextLookup {
    /// `Ok(None)` 表示上下文中没有令牌；`Err` 表示查找本身失败。
    fn security_token(&self) -> Result<Option<Arc<SecurityToken>>, String>;
}

/// 空安全上下文。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSecurityContext;

impl SecurityContextLookup for NoSecurityContext {
    fn security_token(&self) -> Result<Option<Arc<SecurityToken>>, String> {
        Ok(None)
    }
}

/// 令牌向外部密码引擎开放的用途。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TokenUsage {
    Encryption,
    Signature,
}

/// 密钥供给钩子：外部密码引擎随后按标识定位同一密钥。
pub trait KeyProvisioner {
    fn provision(&self, usage: TokenUsage, token: Arc<SecurityToken>);
}

/// 按用途保存出站令牌的默认供给实现，每条报文一份。
#[derive(Debug, Default)]
pub struct OutboundTokens {
    slots: RwLock<HashMap<TokenUsage, Arc<SecurityToken>>>,
}

impl OutboundTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_for(&self, usage: TokenUsage) -> Option<Arc<SecurityToken>> {
        self.slots.read().get(&usage).cloned()
    }
}

impl KeyProvisioner for OutboundTokens {
    fn provision(&self, usage: TokenUsage, token: Arc<SecurityToken>) {
        self.slots.write().insert(usage, token);
    }
}

/// 策略断言跟踪器。
pub trait AssertionTracker {
    fn not_asserted(&self, violation: &PolicyViolation);
}

/// 记录全部未满足断言的跟踪器。
#[derive(Debug, Default)]
pub struct RecordedAssertions {
    violations: Mutex<Vec<PolicyViolation>>,
}

impl RecordedAssertions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn violations(&self) -> Vec<PolicyViolation> {
        self.violations.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }
}

impl AssertionTracker for RecordedAssertions {
    fn not_asserted(&self, violation: &PolicyViolation) {
        self.violations.lock().push(violation.clone());
    }
}

static NO_INBOUND_RESULTS: NoInboundResults = NoInboundResults;
static NO_SECURITY_CONTEXT: NoSecurityContext = NoSecurityContext;

/// 单条出站报文的处理上下文。
///
/// # 契约 (What)
/// - `parts`、`provisioner`、`assertions` 必填；
/// - 入站结果与安全上下文默认为空实现；
/// - `encryption_user` 对应报文上下文中的加密身份覆盖属性。
pub struct MessageContext<'a> {
    parts: &'a dyn MessageParts,
    provisioner: &'a dyn KeyProvisioner,
    assertions: &'a dyn AssertionTracker,
    inbound: &'a dyn InboundResultFeed,
    security_context: &'a dyn SecurityContextLookup,
    supporting_parts: Vec<SecurePart>,
    encryption_user: Option<String>,
}

impl<'a> MessageContext<'a> {
    pub fn new(
        parts: &'a dyn MessageParts,
        provisioner: &'a dyn KeyProvisioner,
        assertions: &'a dyn AssertionTracker,
    ) -> Self {
        Self {
            parts,
            provisioner,
            assertions,
            inbound: &NO_INBOUND_RESULTS,
            security_context: &NO_SECURITY_CONTEXT,
            supporting_parts: Vec::new(),
            encryption_user: None,
        }
    }

    pub fn with_inbound(mut self, inbound: &'a dyn InboundResultFeed) -> Self {
        self.inbound = inbound;
        self
    }

    pub fn with_security_context(mut self, lookup: &'a dyn SecurityContextLookup) -> Self {
        self.security_context = lookup;
        self
    }

    /// 请求方声明的加密型支撑令牌部件。
    pub fn with_supporting_parts(mut self, parts: Vec<SecurePart>) -> Self {
        self.supporting_parts = parts;
        self
    }

    pub fn with_encryption_user(mut self, user: impl Into<String>) -> Self {
        self.encryption_user = Some(user.into());
        self
    }

    pub fn parts(&self) -> &dyn MessageParts {
        self.parts
    }

    pub fn provisioner(&self) -> &dyn KeyProvisioner {
        self.provisioner
    }

    pub fn assertions(&self) -> &dyn AssertionTracker {
        self.assertions
    }

    pub fn inbound(&self) -> &dyn InboundResultFeed {
        self.inbound
    }

    pub fn security_context(&self) -> &dyn SecurityContextLookup {
        self.security_context
    }

    pub fn supporting_parts(&self) -> &[SecurePart] {
        &self.supporting_parts
    }

    pub fn encryption_user(&self) -> Option<&str> {
        self.encryption_user.as_deref()
    }
}
