//! # TokenResolver：保护令牌解析
//!
//! ## 核心意图（Why）
//! - 按策略声明的令牌种类与本端角色取得对称密钥，签名与加密两个阶段共享同一结果；
//! - 三条互斥路径：请求方生成临时密钥、响应方从入站 EncryptedKey 结果提取、
//!   会话/签发类令牌委托安全上下文查找。
//!
//! ## 行为契约（What）
//! - 每次调用只执行一条路径；`UsernameToken` 直接返回策略未满足；
//! - 成功时令牌已登记到仓储，并以加密、签名两种用途交给 [`KeyProvisioner`](crate::context::KeyProvisioner)；
//! - 同一会话的并发报文共享安全上下文令牌，仓储中已有同名令牌不算失败；
//! - 生成与提取的令牌有效期均为创建后 300 000 ms。

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::debug;
use uuid::Uuid;

use crate::context::{EngineResult, InboundAction, MessageContext, TokenUsage};
use crate::error::{
    AssertionTarget, BindingFault, PolicyViolation, Result, TokenStoreError, ViolationReason,
};
use crate::names::algorithms;
use crate::policy::{AlgorithmSuite, Role, TokenKind, TokenPolicy};
use crate::store::{Clock, TokenStore};
use crate::token::{SecretKey, SecurityToken};

/// 令牌的来源路径。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum TokenOrigin {
    /// 安全上下文中的会话/签发令牌。
    SecurityContext,
    /// 请求方新生成的临时密钥。
    Generated,
    /// 响应方从入站 EncryptedKey 结果提取。
    Extracted,
}

/// 解析完成的保护令牌。
#[derive(Clone, Debug)]
pub struct ResolvedToken {
    id: String,
    token: Arc<SecurityToken>,
    origin: TokenOrigin,
}

impl ResolvedToken {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &Arc<SecurityToken> {
        &self.token
    }

    pub fn origin(&self) -> TokenOrigin {
        self.origin
    }
}

/// 按对称算法 URI 给出密钥位长，大小写不敏感。
pub fn key_length_bits(algorithm: &str) -> std::result::Result<usize, BindingFault> {
    const TABLE: [(&str, usize); 7] = [
        (algorithms::AES_128, 128),
        (algorithms::AES_128_GCM, 128),
        (algorithms::AES_192, 192),
        (algorithms::AES_192_GCM, 192),
        (algorithms::TRIPLE_DES, 192),
        (algorithms::AES_256, 256),
        (algorithms::AES_256_GCM, 256),
    ];
    TABLE
        .iter()
        .find(|(uri, _)| uri.eq_ignore_ascii_case(algorithm))
        .map(|(_, bits)| *bits)
        .ok_or_else(|| BindingFault::UnsupportedAlgorithm {
            algorithm: algorithm.to_owned(),
        })
}

/// 被包裹密钥字节的 base64 SHA-1 摘要（`EncryptedKeySHA1` 引用值）。
pub fn encrypted_key_digest(wrapped_key: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(wrapped_key))
}

/// 去掉引用形式标识的 `#` 前缀。
fn strip_reference(id: &str) -> &str {
    id.strip_prefix('#').unwrap_or(id)
}

/// 保护令牌解析器。
pub struct TokenResolver {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    id_prefix: String,
}

impl TokenResolver {
    pub fn new(
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        id_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            clock,
            id_prefix: id_prefix.into(),
        }
    }

    /// 解析 `policy` 声明的令牌。
    ///
    /// # 契约 (What)
    /// - `target`：失败时被标记为未满足的断言（签名令牌或加密令牌）；
    /// - 安全上下文令牌原样返回，不经过仓储的有效期判断；
    /// - 生成或提取的令牌从仓储取回，取不到（含已过期）时返回
    ///   [`ViolationReason::TokenUnavailable`]；
    /// - 提取的令牌不带任何密钥字节时返回 [`ViolationReason::NoKeyMaterial`]；
    /// - 成功时令牌已交给密钥供给钩子。
    pub fn resolve(
        &self,
        policy: &TokenPolicy,
        suite: &AlgorithmSuite,
        role: Role,
        ctx: &MessageContext<'_>,
        target: AssertionTarget,
    ) -> Result<ResolvedToken> {
        let (token, origin) = match policy.kind() {
            TokenKind::UsernameToken => {
                return Err(PolicyViolation::new(
                    AssertionTarget::SymmetricBinding,
                    ViolationReason::UsernameTokenUnsupported,
                )
                .into());
            }
            TokenKind::DerivedKeyCapable(_) => (
                self.from_security_context(ctx, target)?,
                TokenOrigin::SecurityContext,
            ),
            TokenKind::Asymmetric(_) if role.is_requestor() => {
                let id = self.generate(suite)?;
                (self.fetch(&id, target)?, TokenOrigin::Generated)
            }
            TokenKind::Asymmetric(_) => {
                let id = self.extract(ctx, target)?;
                let token = self.fetch(&id, target)?;
                if !token.has_key_material() {
                    return Err(PolicyViolation::new(
                        target,
                        ViolationReason::NoKeyMaterial { id },
                    )
                    .into());
                }
                (token, TokenOrigin::Extracted)
            }
        };

        let id = token.id().to_owned();
        ctx.provisioner().provision(TokenUsage::Encryption, Arc::clone(&token));
        ctx.provisioner().provision(TokenUsage::Signature, Arc::clone(&token));
        debug!(token_id = %id, ?origin, ?role, "resolved protection token");

        Ok(ResolvedToken { id, token, origin })
    }

    fn fetch(&self, id: &str, target: AssertionTarget) -> Result<Arc<SecurityToken>> {
        let id = strip_reference(id);
        self.store.get(id).ok_or_else(|| {
            PolicyViolation::new(target, ViolationReason::TokenUnavailable { id: id.to_owned() })
                .into()
        })
    }

    /// 安全上下文令牌登记到仓储供后续消费者按标识查找；并发报文已登记同一令牌时视为成功。
    fn from_security_context(
        &self,
        ctx: &MessageContext<'_>,
        target: AssertionTarget,
    ) -> Result<Arc<SecurityToken>> {
        let token = ctx
            .security_context()
            .security_token()
            .map_err(|detail| BindingFault::SecurityContext { detail })?
            .ok_or_else(|| PolicyViolation::new(target, ViolationReason::MissingTokenId))?;

        match self.store.add(SecurityToken::clone(&token)) {
            Ok(_) => debug!(token_id = token.id(), "registered security context token"),
            Err(TokenStoreError::DuplicateId { .. }) => {}
        }
        Ok(token)
    }

    fn generate(&self, suite: &AlgorithmSuite) -> Result<String> {
        let bits = key_length_bits(suite.encryption())?;
        let mut bytes = vec![0u8; bits / 8];
        OsRng.fill_bytes(&mut bytes);

        let id = format!("{}{}", self.id_prefix, Uuid::new_v4());
        let token = SecurityToken::ephemeral(id, self.clock.now())
            .with_secret(bytes.clone())
            .with_key(SecretKey::new(suite.encryption(), bytes));
        let stored = self.store.add(token)?;
        debug!(token_id = stored.id(), bits, "generated ephemeral key");
        Ok(stored.id().to_owned())
    }

    fn extract(&self, ctx: &MessageContext<'_>, target: AssertionTarget) -> Result<String> {
        let result = find_encrypted_key(ctx)
            .ok_or_else(|| PolicyViolation::new(target, ViolationReason::MissingTokenId))?;
        let id = result.id().map(strip_reference).unwrap_or_default();

        let mut token = SecurityToken::ephemeral(id, self.clock.now());
        if let Some(secret) = result.secret() {
            token = token.with_secret(secret.to_vec());
        }
        if let Some(wrapped) = result.encrypted_ephemeral_key() {
            token = token.with_digest(encrypted_key_digest(wrapped));
        }
        let stored = self.store.add(token)?;
        debug!(token_id = stored.id(), "extracted inbound encrypted key");
        Ok(stored.id().to_owned())
    }
}

/// 当前交换中第一个带非空标识的 EncryptedKey 结果。
fn find_encrypted_key<'c>(ctx: &'c MessageContext<'_>) -> Option<&'c EngineResult> {
    ctx.inbound()
        .current_exchange()
        .iter()
        .flat_map(|handler| handler.results())
        .find(|result| {
            result.action() == InboundAction::Encryption
                && result.id().is_some_and(|id| !strip_reference(id).is_empty())
        })
}

impl std::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResolver")
            .field("id_prefix", &self.id_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::context::{HandlerResult, OutboundTokens, RecordedAssertions};
    use crate::error::BindingError;
    use crate::policy::ContextTokenKind;
    use crate::store::{InMemoryTokenStore, ManualClock};
    use crate::test_stubs::{FailingSecurityContext, FixedSecurityContext, StaticMessageParts};

    struct Fixture {
        clock: Arc<ManualClock>,
        store: Arc<InMemoryTokenStore>,
        resolver: TokenResolver,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        ));
        let store = Arc::new(InMemoryTokenStore::new(clock.clone()));
        let resolver = TokenResolver::new(store.clone(), clock.clone(), "EK-");
        Fixture { clock, store, resolver }
    }

    #[test]
    fn key_lengths_follow_algorithm_family() {
        assert_eq!(key_length_bits(algorithms::AES_128).unwrap(), 128);
        assert_eq!(key_length_bits(algorithms::AES_192_GCM).unwrap(), 192);
        assert_eq!(key_length_bits(algorithms::TRIPLE_DES).unwrap(), 192);
        assert_eq!(key_length_bits(&algorithms::AES_256_GCM.to_uppercase()).unwrap(), 256);
        assert!(matches!(
            key_length_bits("urn:example:rc4"),
            Err(BindingFault::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn digest_is_base64_sha1() {
        assert_eq!(encrypted_key_digest(b"abc"), "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
    }

    #[test]
    fn requestor_generates_sized_ephemeral_key() {
        let fx = fixture();
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions);

        let resolved = fx
            .resolver
            .resolve(
                &TokenPolicy::x509(),
                &AlgorithmSuite::basic128(),
                Role::Requestor,
                &ctx,
                AssertionTarget::EncryptionToken,
            )
            .expect("generated");

        assert_eq!(resolved.origin(), TokenOrigin::Generated);
        assert!(resolved.id().starts_with("EK-"));
        let token = resolved.token();
        assert_eq!(token.key().map(SecretKey::bit_len), Some(128));
        let window = token.expires().duration_since(token.created()).unwrap();
        assert_eq!(window.as_millis(), 300_000);
        assert_eq!(outbound.token_for(TokenUsage::Encryption).unwrap().id(), resolved.id());
        assert_eq!(outbound.token_for(TokenUsage::Signature).unwrap().id(), resolved.id());
        assert!(fx.store.get(resolved.id()).is_some());

        fx.clock.advance(Duration::from_millis(300_000));
        assert!(fx.store.get(resolved.id()).is_none());
    }

    #[test]
    fn requestor_with_unknown_algorithm_faults() {
        let fx = fixture();
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions);
        let suite =
            AlgorithmSuite::new("urn:example:rc4", algorithms::KW_RSA_OAEP, algorithms::HMAC_SHA1);

        let err = fx
            .resolver
            .resolve(
                &TokenPolicy::x509(),
                &suite,
                Role::Requestor,
                &ctx,
                AssertionTarget::EncryptionToken,
            )
            .expect_err("unsupported");
        assert!(matches!(
            err,
            BindingError::Fault(BindingFault::UnsupportedAlgorithm { .. })
        ));
        assert!(fx.store.is_empty());
    }

    #[test]
    fn responder_extracts_first_identified_encrypted_key() {
        let fx = fixture();
        let inbound = vec![
            HandlerResult::new(vec![
                EngineResult::new(InboundAction::Timestamp),
                EngineResult::new(InboundAction::Encryption).with_id(""),
            ]),
            HandlerResult::new(vec![
                EngineResult::encrypted_key("#EK-peer", vec![7; 32], b"abc".to_vec()),
                EngineResult::encrypted_key("EK-second", vec![8; 32], b"def".to_vec()),
            ]),
        ];
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions).with_inbound(&inbound);

        let resolved = fx
            .resolver
            .resolve(
                &TokenPolicy::x509(),
                &AlgorithmSuite::basic256(),
                Role::Responder,
                &ctx,
                AssertionTarget::SignatureToken,
            )
            .expect("extracted");

        assert_eq!(resolved.origin(), TokenOrigin::Extracted);
        assert_eq!(resolved.id(), "EK-peer");
        assert_eq!(resolved.token().secret(), Some(&[7u8; 32][..]));
        assert_eq!(resolved.token().digest(), Some("qZk+NkcGgWq6PiVxeFDCbJzQ2J0="));
        assert!(resolved.token().key().is_none(), "responder never generates");
    }

    #[test]
    fn responder_without_inbound_key_is_not_asserted() {
        let fx = fixture();
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions);

        let err = fx
            .resolver
            .resolve(
                &TokenPolicy::x509(),
                &AlgorithmSuite::basic256(),
                Role::Responder,
                &ctx,
                AssertionTarget::SignatureToken,
            )
            .expect_err("no inbound result");
        let violation = err.into_violation().expect("violation");
        assert_eq!(violation.reason(), &ViolationReason::MissingTokenId);
        assert_eq!(violation.target(), AssertionTarget::SignatureToken);
        assert!(outbound.token_for(TokenUsage::Signature).is_none());
    }

    #[test]
    fn username_token_is_rejected_without_touching_store() {
        let fx = fixture();
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions);

        let err = fx
            .resolver
            .resolve(
                &TokenPolicy::new(TokenKind::UsernameToken),
                &AlgorithmSuite::basic256(),
                Role::Requestor,
                &ctx,
                AssertionTarget::EncryptionToken,
            )
            .expect_err("username token");
        let violation = err.into_violation().expect("violation");
        assert_eq!(violation.reason(), &ViolationReason::UsernameTokenUnsupported);
        assert!(fx.store.is_empty());
    }

    #[test]
    fn context_tokens_come_from_security_context() {
        let fx = fixture();
        let session = SecurityToken::ephemeral("sct-1", fx.clock.now()).with_secret(vec![1; 32]);
        let lookup = FixedSecurityContext::new(session);
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx =
            MessageContext::new(&parts, &outbound, &assertions).with_security_context(&lookup);
        let policy =
            TokenPolicy::new(TokenKind::DerivedKeyCapable(ContextTokenKind::SecureConversation));

        for role in [Role::Requestor, Role::Responder] {
            let resolved = fx
                .resolver
                .resolve(
                    &policy,
                    &AlgorithmSuite::basic256(),
                    role,
                    &ctx,
                    AssertionTarget::EncryptionToken,
                )
                .expect("context token");
            assert_eq!(resolved.origin(), TokenOrigin::SecurityContext);
            assert_eq!(resolved.id(), "sct-1");
        }
        assert_eq!(fx.store.len(), 1);
    }

    #[test]
    fn failing_security_context_is_a_fault() {
        let fx = fixture();
        let lookup = FailingSecurityContext::new("session cache offline");
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx =
            MessageContext::new(&parts, &outbound, &assertions).with_security_context(&lookup);
        let policy = TokenPolicy::new(TokenKind::DerivedKeyCapable(ContextTokenKind::Kerberos));

        let err = fx
            .resolver
            .resolve(
                &policy,
                &AlgorithmSuite::basic256(),
                Role::Requestor,
                &ctx,
                AssertionTarget::EncryptionToken,
            )
            .expect_err("lookup failure");
        assert!(matches!(err, BindingError::Fault(BindingFault::SecurityContext { .. })));
    }

    #[test]
    fn suite_presets_size_generated_keys() {
        let fx = fixture();
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions);

        let presets = [
            (AlgorithmSuite::basic128(), 128),
            (AlgorithmSuite::basic192(), 192),
            (AlgorithmSuite::basic256(), 256),
            (AlgorithmSuite::basic128_gcm(), 128),
            (AlgorithmSuite::basic256_gcm(), 256),
            (AlgorithmSuite::basic256_sha256(), 256),
        ];
        for (suite, bits) in presets {
            let resolved = fx
                .resolver
                .resolve(
                    &TokenPolicy::x509(),
                    &suite,
                    Role::Requestor,
                    &ctx,
                    AssertionTarget::EncryptionToken,
                )
                .expect("generated");
            assert_eq!(resolved.token().key().map(SecretKey::bit_len), Some(bits));
        }
        assert_eq!(
            AlgorithmSuite::basic256_sha256().symmetric_signature(),
            algorithms::HMAC_SHA256
        );
    }

    #[test]
    fn context_token_is_returned_even_when_store_rules_expire_it() {
        let fx = fixture();
        let created = fx.clock.now() - Duration::from_secs(600);
        let session = SecurityToken::ephemeral("sct-old", created).with_secret(vec![5; 32]);
        let lookup = FixedSecurityContext::new(session);
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx =
            MessageContext::new(&parts, &outbound, &assertions).with_security_context(&lookup);
        let policy = TokenPolicy::new(TokenKind::DerivedKeyCapable(ContextTokenKind::Issued));

        let resolved = fx
            .resolver
            .resolve(
                &policy,
                &AlgorithmSuite::basic256(),
                Role::Responder,
                &ctx,
                AssertionTarget::SignatureToken,
            )
            .expect("context token");
        assert_eq!(resolved.id(), "sct-old");
        assert_eq!(resolved.token().secret(), Some(&[5u8; 32][..]));
        assert_eq!(outbound.token_for(TokenUsage::Signature).unwrap().id(), "sct-old");
    }

    #[test]
    fn context_token_already_registered_is_not_a_fault() {
        let fx = fixture();
        let session = SecurityToken::ephemeral("sct-2", fx.clock.now()).with_secret(vec![6; 32]);
        fx.store.add(session.clone()).expect("first registration");
        let lookup = FixedSecurityContext::new(session);
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx =
            MessageContext::new(&parts, &outbound, &assertions).with_security_context(&lookup);
        let policy =
            TokenPolicy::new(TokenKind::DerivedKeyCapable(ContextTokenKind::SecureConversation));

        let resolved = fx
            .resolver
            .resolve(
                &policy,
                &AlgorithmSuite::basic256(),
                Role::Requestor,
                &ctx,
                AssertionTarget::EncryptionToken,
            )
            .expect("context token");
        assert_eq!(resolved.origin(), TokenOrigin::SecurityContext);
        assert_eq!(fx.store.len(), 1);
    }

    #[test]
    fn encrypted_key_without_secret_has_no_key_material() {
        let fx = fixture();
        let inbound = vec![HandlerResult::new(vec![
            EngineResult::new(InboundAction::Encryption).with_id("EK-bare"),
        ])];
        let parts = StaticMessageParts::default();
        let outbound = OutboundTokens::new();
        let assertions = RecordedAssertions::new();
        let ctx = MessageContext::new(&parts, &outbound, &assertions).with_inbound(&inbound);

        let err = fx
            .resolver
            .resolve(
                &TokenPolicy::x509(),
                &AlgorithmSuite::basic256(),
                Role::Responder,
                &ctx,
                AssertionTarget::SignatureToken,
            )
            .expect_err("no key material");
        let violation = err.into_violation().expect("violation");
        assert_eq!(violation.target(), AssertionTarget::SignatureToken);
        assert_eq!(
            violation.reason(),
            &ViolationReason::NoKeyMaterial {
                id: "EK-bare".to_owned()
            }
        );
        assert!(outbound.token_for(TokenUsage::Signature).is_none());
    }
}
