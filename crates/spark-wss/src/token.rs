//! 安全令牌与对称密钥材料。

use std::fmt;
use std::time::{Duration, SystemTime};

use zeroize::Zeroizing;

/// 临时令牌的有效期：创建后 300 000 ms。
pub const EPHEMERAL_TOKEN_LIFETIME: Duration = Duration::from_millis(300_000);

/// 对称密钥：算法 URI + 密钥字节，释放时清零。
#[derive(Clone)]
pub struct SecretKey {
    algorithm: String,
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    pub fn new(algorithm: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            bytes: Zeroizing::new(bytes),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 密钥位长。
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .field("bits", &self.bit_len())
            .finish_non_exhaustive()
    }
}

/// 令牌仓储中的条目。
///
/// # 契约 (What)
/// - `id` 在仓储生命周期内唯一；
/// - 构造完成后不可变：`with_*` 方法只在构造阶段按值附加密钥、原始密文与摘要；
/// - 过期判定以 `expires` 为准，由仓储或使用方在使用时检查。
#[derive(Clone)]
pub struct SecurityToken {
    id: String,
    created: SystemTime,
    expires: SystemTime,
    key: Option<SecretKey>,
    secret: Option<Zeroizing<Vec<u8>>>,
    digest: Option<String>,
}

impl SecurityToken {
    pub fn new(id: impl Into<String>, created: SystemTime, expires: SystemTime) -> Self {
        Self {
            id: id.into(),
            created,
            expires,
            key: None,
            secret: None,
            digest: None,
        }
    }

    /// 以固定 300 000 ms 窗口构造临时令牌。
    pub fn ephemeral(id: impl Into<String>, created: SystemTime) -> Self {
        Self::new(id, created, created + EPHEMERAL_TOKEN_LIFETIME)
    }

    pub fn with_key(mut self, key: SecretKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_secret(mut self, secret: Vec<u8>) -> Self {
        self.secret = Some(Zeroizing::new(secret));
        self
    }

    /// 附加 EncryptedKey 摘要（base64 编码的 SHA-1）。
    pub fn with_digest(mut self, digest: String) -> Self {
        self.digest = Some(digest);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> SystemTime {
        self.created
    }

    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    pub fn key(&self) -> Option<&SecretKey> {
        self.key.as_ref()
    }

    pub fn secret(&self) -> Option<&[u8]> {
        self.secret.as_deref().map(Vec::as_slice)
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// `now` 晚于或等于 `expires` 时视为过期。
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires
    }

    /// 是否携带可直接使用的密钥字节（生成的密钥或入站提取的原始密文）。
    pub fn has_key_material(&self) -> bool {
        self.key.is_some() || self.secret.is_some()
    }
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityToken")
            .field("id", &self.id)
            .field("created", &self.created)
            .field("expires", &self.expires)
            .field("key", &self.key)
            .field("has_secret", &self.secret.is_some())
            .field("digest", &self.digest)
            .finish()
    }
}
