//! 已解析的对称绑定策略模型。
//!
//! WS-Policy 文档的解析不在本 crate 范围内；这里只描述解析结果，供协调器在一次运行中只读使用。
//! 所有类型都派生 `serde`，便于从 TOML/JSON 夹具加载。

use serde::{Deserialize, Serialize};

use crate::names::algorithms;

/// 签名与加密的先后顺序。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ProtectionOrder {
    EncryptBeforeSigning,
    #[default]
    SignBeforeEncrypting,
}

/// 本端在交换中的角色。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Role {
    /// 发起方（客户端）。
    Requestor,
    /// 响应方（服务端）。
    Responder,
}

impl Role {
    pub fn is_requestor(self) -> bool {
        matches!(self, Role::Requestor)
    }
}

/// 通过安全上下文查找获得密钥的令牌种类，解析方式完全相同。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ContextTokenKind {
    Issued,
    Kerberos,
    SecureConversation,
    SecurityContext,
    SpnegoContext,
}

/// X.509 类令牌声明的引用方式要求。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceRequirements {
    pub issuer_serial: bool,
    pub key_identifier: bool,
    pub thumbprint: bool,
}

/// 策略声明的令牌种类。
///
/// # 契约 (What)
/// - 封闭枚举：解析器对每个变体各有一条路径，编译期穷尽检查；
/// - `UsernameToken` 在对称绑定下总是导致策略未满足。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    DerivedKeyCapable(ContextTokenKind),
    Asymmetric(ReferenceRequirements),
    UsernameToken,
}

impl TokenKind {
    pub fn is_asymmetric(&self) -> bool {
        matches!(self, TokenKind::Asymmetric(_))
    }
}

/// 令牌的 `sp:IncludeToken` 取值。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum InclusionPolicy {
    Never,
    Once,
    AlwaysToRecipient,
    AlwaysToInitiator,
    #[default]
    Always,
}

/// 令牌包装器：种类、包含策略与派生密钥要求。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenPolicy {
    kind: TokenKind,
    #[serde(default)]
    inclusion: InclusionPolicy,
    #[serde(default)]
    derived_keys: bool,
}

impl TokenPolicy {
    pub fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            inclusion: InclusionPolicy::default(),
            derived_keys: false,
        }
    }

    /// X.509 令牌，默认不要求特定引用方式。
    pub fn x509() -> Self {
        Self::new(TokenKind::Asymmetric(ReferenceRequirements::default()))
    }

    pub fn with_inclusion(mut self, inclusion: InclusionPolicy) -> Self {
        self.inclusion = inclusion;
        self
    }

    pub fn require_derived_keys(mut self) -> Self {
        self.derived_keys = true;
        self
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub fn inclusion(&self) -> InclusionPolicy {
        self.inclusion
    }

    pub fn derived_keys(&self) -> bool {
        self.derived_keys
    }
}

/// 算法套件。
///
/// `require_derived_keys` 只是套件声明，不改变动作变体；派生动作只由阶段令牌决定。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSuite {
    encryption: String,
    asymmetric_key_wrap: String,
    symmetric_signature: String,
    #[serde(default)]
    require_derived_keys: bool,
}

impl AlgorithmSuite {
    pub fn new(
        encryption: impl Into<String>,
        asymmetric_key_wrap: impl Into<String>,
        symmetric_signature: impl Into<String>,
    ) -> Self {
        Self {
            encryption: encryption.into(),
            asymmetric_key_wrap: asymmetric_key_wrap.into(),
            symmetric_signature: symmetric_signature.into(),
            require_derived_keys: false,
        }
    }

    pub fn basic128() -> Self {
        Self::new(algorithms::AES_128, algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA1)
    }

    pub fn basic192() -> Self {
        Self::new(algorithms::AES_192, algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA1)
    }

    pub fn basic256() -> Self {
        Self::new(algorithms::AES_256, algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA1)
    }

    pub fn basic128_gcm() -> Self {
        Self::new(algorithms::AES_128_GCM, algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA1)
    }

    pub fn basic256_gcm() -> Self {
        Self::new(algorithms::AES_256_GCM, algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA1)
    }

    pub fn basic256_sha256() -> Self {
        Self::new(algorithms::AES_256, algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA256)
    }

    pub fn require_derived_keys(mut self) -> Self {
        self.require_derived_keys = true;
        self
    }

    pub fn encryption(&self) -> &str {
        &self.encryption
    }

    pub fn asymmetric_key_wrap(&self) -> &str {
        &self.asymmetric_key_wrap
    }

    pub fn symmetric_signature(&self) -> &str {
        &self.symmetric_signature
    }

    pub fn derived_keys_required(&self) -> bool {
        self.require_derived_keys
    }
}

impl Default for AlgorithmSuite {
    fn default() -> Self {
        Self::basic256()
    }
}

/// `sp:Wss10`/`sp:Wss11` 中与本绑定相关的选项。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WssOptions {
    pub must_support_ref_key_identifier: bool,
    pub must_support_ref_issuer_serial: bool,
    pub must_support_ref_thumbprint: bool,
    pub require_signature_confirmation: bool,
}

impl Default for WssOptions {
    fn default() -> Self {
        Self {
            must_support_ref_key_identifier: false,
            must_support_ref_issuer_serial: false,
            must_support_ref_thumbprint: false,
            require_signature_confirmation: true,
        }
    }
}

/// 已解析的 `sp:SymmetricBinding`。
///
/// # 契约 (What)
/// - `protection_token` 存在时同时充当签名令牌与加密令牌；
/// - 各开关对应策略断言：`encrypt_signature` = `sp:EncryptSignature`，
///   `protect_tokens` = `sp:ProtectTokens`，`include_timestamp` = `sp:IncludeTimestamp`。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymmetricBinding {
    protection_order: ProtectionOrder,
    protection_token: Option<TokenPolicy>,
    signature_token: Option<TokenPolicy>,
    encryption_token: Option<TokenPolicy>,
    algorithm_suite: AlgorithmSuite,
    encrypt_signature: bool,
    protect_tokens: bool,
    include_timestamp: bool,
    wss: WssOptions,
}

impl SymmetricBinding {
    /// 以共享保护令牌构建绑定。
    pub fn with_protection_token(token: TokenPolicy) -> Self {
        Self {
            protection_token: Some(token),
            ..Self::default()
        }
    }

    /// 分别声明签名令牌与加密令牌。
    pub fn with_split_tokens(
        signature_token: Option<TokenPolicy>,
        encryption_token: Option<TokenPolicy>,
    ) -> Self {
        Self {
            signature_token,
            encryption_token,
            ..Self::default()
        }
    }

    pub fn protection_order_is(mut self, order: ProtectionOrder) -> Self {
        self.protection_order = order;
        self
    }

    pub fn algorithm_suite_is(mut self, suite: AlgorithmSuite) -> Self {
        self.algorithm_suite = suite;
        self
    }

    pub fn encrypt_signature(mut self) -> Self {
        self.encrypt_signature = true;
        self
    }

    pub fn protect_tokens(mut self) -> Self {
        self.protect_tokens = true;
        self
    }

    pub fn include_timestamp(mut self) -> Self {
        self.include_timestamp = true;
        self
    }

    pub fn wss_is(mut self, wss: WssOptions) -> Self {
        self.wss = wss;
        self
    }

    pub fn protection_order(&self) -> ProtectionOrder {
        self.protection_order
    }

    /// 签名阶段使用的令牌包装器。
    pub fn signature_token(&self) -> Option<&TokenPolicy> {
        self.protection_token
            .as_ref()
            .or(self.signature_token.as_ref())
    }

    /// 加密阶段使用的令牌包装器。
    pub fn encryption_token(&self) -> Option<&TokenPolicy> {
        self.protection_token
            .as_ref()
            .or(self.encryption_token.as_ref())
    }

    pub fn algorithm_suite(&self) -> &AlgorithmSuite {
        &self.algorithm_suite
    }

    pub fn encrypts_signature(&self) -> bool {
        self.encrypt_signature
    }

    pub fn protects_tokens(&self) -> bool {
        self.protect_tokens
    }

    pub fn includes_timestamp(&self) -> bool {
        self.include_timestamp
    }

    pub fn wss(&self) -> &WssOptions {
        &self.wss
    }
}
