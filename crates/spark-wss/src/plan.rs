//! # 保护计划（ProtectionPlan）与构建器
//!
//! ## 核心意图（Why）
//! - 以不可变的声明式计划替代共享的可变属性表：协调器通过 [`ActionPlanBuilder`] 逐阶段追加，
//!   `build` 之后计划只读；
//! - 计划可序列化（`serde`），也可渲染为外部密码引擎使用的 WSS4J 属性表。
//!
//! ## 行为契约（What）
//! - 阶段部件列表为空时不追加该阶段的动作；
//! - 已有 `SAMLTokenSigned` 前置动作时不追加签名动作，但仍记录签名部件与参数；
//! - 部件描述符格式为 `{Modifier}{namespaceURI}localName;`，签名部件固定使用 `Element`。

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::names::properties;
use crate::part::{Modifier, SecurePart};
use crate::policy::{
    InclusionPolicy, Role, SymmetricBinding, TokenKind, TokenPolicy, WssOptions,
};
use crate::resolver::{ResolvedToken, TokenOrigin};

/// 计划中的动作，线上名称与 WSS4J 配置常量一致。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Timestamp,
    UsernameToken,
    SAMLTokenSigned,
    SAMLTokenUnsigned,
    Signature,
    SignatureDerived,
    Encrypt,
    EncryptDerived,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Timestamp => "Timestamp",
            Action::UsernameToken => "UsernameToken",
            Action::SAMLTokenSigned => "SAMLTokenSigned",
            Action::SAMLTokenUnsigned => "SAMLTokenUnsigned",
            Action::Signature => "Signature",
            Action::SignatureDerived => "SignatureDerived",
            Action::Encrypt => "Encrypt",
            Action::EncryptDerived => "EncryptDerived",
        }
    }

    /// 是否为签名类动作（含派生变体）。
    pub fn is_signature(self) -> bool {
        matches!(self, Action::Signature | Action::SignatureDerived)
    }

    /// 是否为加密类动作（含派生变体）。
    pub fn is_encryption(self) -> bool {
        matches!(self, Action::Encrypt | Action::EncryptDerived)
    }

    const ALL: [Action; 8] = [
        Action::Timestamp,
        Action::UsernameToken,
        Action::SAMLTokenSigned,
        Action::SAMLTokenUnsigned,
        Action::Signature,
        Action::SignatureDerived,
        Action::Encrypt,
        Action::EncryptDerived,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的动作名称。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("unknown protection action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_owned()))
    }
}

/// 密钥引用方式。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum KeyIdentifier {
    IssuerSerial,
    DirectReference,
    SKIKeyIdentifier,
    Thumbprint,
    EncryptedKey,
    EncryptedKeySHA1,
}

impl KeyIdentifier {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyIdentifier::IssuerSerial => "IssuerSerial",
            KeyIdentifier::DirectReference => "DirectReference",
            KeyIdentifier::SKIKeyIdentifier => "SKIKeyIdentifier",
            KeyIdentifier::Thumbprint => "Thumbprint",
            KeyIdentifier::EncryptedKey => "EncryptedKey",
            KeyIdentifier::EncryptedKeySHA1 => "EncryptedKeySHA1",
        }
    }
}

/// 按令牌声明的引用要求与 WSS 选项选择密钥引用方式。
///
/// X.509 令牌显式要求的引用方式优先；否则 `Never` 包含策略在 WSS 选项支持的方式中
/// 依次尝试 key-identifier、issuer-serial、thumbprint，默认 `IssuerSerial`；其余包含策略
/// 使用 `DirectReference`。
pub fn select_key_identifier(token: &TokenPolicy, wss: &WssOptions) -> KeyIdentifier {
    if let TokenKind::Asymmetric(requirements) = token.kind() {
        if requirements.issuer_serial {
            return KeyIdentifier::IssuerSerial;
        }
        if requirements.key_identifier {
            return KeyIdentifier::SKIKeyIdentifier;
        }
        if requirements.thumbprint {
            return KeyIdentifier::Thumbprint;
        }
    }

    if token.inclusion() != InclusionPolicy::Never {
        return KeyIdentifier::DirectReference;
    }
    if wss.must_support_ref_key_identifier {
        KeyIdentifier::SKIKeyIdentifier
    } else if wss.must_support_ref_issuer_serial {
        KeyIdentifier::IssuerSerial
    } else if wss.must_support_ref_thumbprint {
        KeyIdentifier::Thumbprint
    } else {
        KeyIdentifier::IssuerSerial
    }
}

/// 加密阶段参数。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EncryptionParams {
    pub key_identifier: KeyIdentifier,
    pub key_transport_algorithm: String,
    pub symmetric_algorithm: String,
    pub user: Option<String>,
}

/// 签名阶段参数。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignatureParams {
    pub key_identifier: KeyIdentifier,
    pub include_token: bool,
    pub algorithm: String,
    /// `EncryptedKeySHA1` 引用所需的摘要值。
    pub key_digest: Option<String>,
}

/// 一次运行产出的不可变保护计划。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProtectionPlan {
    actions: Vec<Action>,
    signature_parts: String,
    encryption_parts: String,
    encryption: Option<EncryptionParams>,
    signature: Option<SignatureParams>,
    token_id: Option<String>,
    token_origin: Option<TokenOrigin>,
}

impl ProtectionPlan {
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// 空格分隔的动作序列。
    pub fn action_sequence(&self) -> String {
        self.actions
            .iter()
            .map(|action| action.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn signature_parts(&self) -> &str {
        &self.signature_parts
    }

    pub fn encryption_parts(&self) -> &str {
        &self.encryption_parts
    }

    pub fn encryption(&self) -> Option<&EncryptionParams> {
        self.encryption.as_ref()
    }

    pub fn signature(&self) -> Option<&SignatureParams> {
        self.signature.as_ref()
    }

    pub fn token_id(&self) -> Option<&str> {
        self.token_id.as_deref()
    }

    pub fn token_origin(&self) -> Option<TokenOrigin> {
        self.token_origin
    }

    /// 计划中是否既没有签名也没有加密动作。
    pub fn is_empty(&self) -> bool {
        !self
            .actions
            .iter()
            .any(|action| action.is_signature() || action.is_encryption())
    }

    /// 渲染为 WSS4J 属性表；未设置的参数不出现在表中。
    pub fn to_properties(&self) -> BTreeMap<&'static str, String> {
        let mut map = BTreeMap::new();
        if !self.actions.is_empty() {
            map.insert(properties::ACTION, self.action_sequence());
        }
        if !self.signature_parts.is_empty() {
            map.insert(properties::SIGNATURE_PARTS, self.signature_parts.clone());
        }
        if !self.encryption_parts.is_empty() {
            map.insert(properties::ENCRYPTION_PARTS, self.encryption_parts.clone());
        }
        if let Some(enc) = &self.encryption {
            map.insert(properties::ENC_KEY_ID, enc.key_identifier.as_str().to_owned());
            map.insert(properties::ENC_KEY_TRANSPORT, enc.key_transport_algorithm.clone());
            map.insert(properties::ENC_SYM_ALGO, enc.symmetric_algorithm.clone());
            if let Some(user) = &enc.user {
                map.insert(properties::ENCRYPTION_USER, user.clone());
            }
        }
        if let Some(sig) = &self.signature {
            map.insert(properties::SIG_KEY_ID, sig.key_identifier.as_str().to_owned());
            map.insert(properties::INCLUDE_SIGNATURE_TOKEN, sig.include_token.to_string());
            map.insert(properties::SIG_ALGO, sig.algorithm.clone());
            if let Some(digest) = &sig.key_digest {
                map.insert(properties::SIG_KEY_DIGEST, digest.clone());
            }
        }
        map
    }
}

/// 计划构建器。
///
/// # 契约 (What)
/// - 可用前置动作与已有部件描述符预置，模拟同一报文上先行处理器留下的配置；
/// - `add_*_phase` 返回是否真正追加了阶段；
/// - `build` 消费构建器，产出不可变的 [`ProtectionPlan`]。
#[derive(Debug, Default)]
pub struct ActionPlanBuilder {
    plan: ProtectionPlan,
}

impl ActionPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preceding_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.plan.actions.extend(actions);
        self
    }

    pub fn with_signature_parts(mut self, descriptor: impl Into<String>) -> Self {
        self.plan.signature_parts = descriptor.into();
        self
    }

    pub fn with_encryption_parts(mut self, descriptor: impl Into<String>) -> Self {
        self.plan.encryption_parts = descriptor.into();
        self
    }

    /// 记录本次运行解析出的保护令牌。
    pub fn bind_token(&mut self, resolved: &ResolvedToken) {
        self.plan.token_id = Some(resolved.id().to_owned());
        self.plan.token_origin = Some(resolved.origin());
    }

    /// 追加加密阶段。
    pub fn add_encryption_phase(
        &mut self,
        parts: &[SecurePart],
        token: &TokenPolicy,
        binding: &SymmetricBinding,
        user: Option<String>,
    ) -> bool {
        if parts.is_empty() {
            return false;
        }
        let action = if token.derived_keys() {
            Action::EncryptDerived
        } else {
            Action::Encrypt
        };
        self.plan.actions.push(action);
        let suite = binding.algorithm_suite();

        append_descriptors(
            &mut self.plan.encryption_parts,
            parts.iter().map(|part| (part.modifier(), part)),
        );
        self.plan.encryption = Some(EncryptionParams {
            key_identifier: select_key_identifier(token, binding.wss()),
            key_transport_algorithm: suite.asymmetric_key_wrap().to_owned(),
            symmetric_algorithm: suite.encryption().to_owned(),
            user,
        });
        true
    }

    /// 追加签名阶段。
    pub fn add_signature_phase(
        &mut self,
        parts: &[SecurePart],
        token: &TokenPolicy,
        binding: &SymmetricBinding,
        role: Role,
        resolved: &ResolvedToken,
    ) -> bool {
        if parts.is_empty() {
            return false;
        }
        let action = if token.derived_keys() {
            Action::SignatureDerived
        } else {
            Action::Signature
        };
        if !self.plan.actions.contains(&Action::SAMLTokenSigned) {
            self.plan.actions.push(action);
        }
        let suite = binding.algorithm_suite();

        append_descriptors(
            &mut self.plan.signature_parts,
            parts.iter().map(|part| (Modifier::Element, part)),
        );

        let (key_identifier, key_digest) = match token.kind() {
            TokenKind::Asymmetric(_) if role.is_requestor() => {
                (KeyIdentifier::EncryptedKey, None)
            }
            TokenKind::Asymmetric(_) => (
                KeyIdentifier::EncryptedKeySHA1,
                resolved.token().digest().map(str::to_owned),
            ),
            _ => (select_key_identifier(token, binding.wss()), None),
        };
        self.plan.signature = Some(SignatureParams {
            key_identifier,
            include_token: false,
            algorithm: suite.symmetric_signature().to_owned(),
            key_digest,
        });
        true
    }

    pub fn build(self) -> ProtectionPlan {
        self.plan
    }
}

fn append_descriptors<'p>(
    descriptor: &mut String,
    parts: impl Iterator<Item = (Modifier, &'p SecurePart)>,
) {
    if !descriptor.is_empty() && !descriptor.ends_with(';') {
        descriptor.push(';');
    }
    for (modifier, part) in parts {
        descriptor.push('{');
        descriptor.push_str(modifier.as_str());
        descriptor.push('}');
        descriptor.push_str(&part.name().to_string());
        descriptor.push(';');
    }
}
