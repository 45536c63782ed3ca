//! 协议常量：命名空间、元素名与算法 URI。
//!
//! 这些字符串是本引擎与外部密码引擎之间的线上契约，必须逐字节保持与 WSS4J/XML-Security
//! 一致，修改前需确认下游引擎的解析规则。

/// XML Digital Signature 命名空间。
pub const NS_DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
/// WS-Security 1.0 utility 命名空间（`wsu`）。
pub const NS_WSU10: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
/// WS-Security 1.0 secext 命名空间（`wsse`）。
pub const NS_WSSE10: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
/// WS-Security 1.1 secext 命名空间（`wsse11`）。
pub const NS_WSSE11: &str = "http://docs.oasis-open.org/wss/oasis-wss-wssecurity-secext-1.1.xsd";
/// SOAP 1.1 Envelope 命名空间，测试与桩对象构造 Body 部件时使用。
pub const NS_SOAP11: &str = "http://schemas.xmlsoap.org/soap/envelope/";

pub const LN_SIGNATURE: &str = "Signature";
pub const LN_TIMESTAMP: &str = "Timestamp";
pub const LN_BINARY_SECURITY_TOKEN: &str = "BinarySecurityToken";
pub const LN_SIGNATURE_CONFIRMATION: &str = "SignatureConfirmation";
pub const LN_BODY: &str = "Body";

/// 对称加密算法 URI。
pub mod algorithms {
    pub const AES_128: &str = "http://www.w3.org/2001/04/xmlenc#aes128-cbc";
    pub const AES_192: &str = "http://www.w3.org/2001/04/xmlenc#aes192-cbc";
    pub const AES_256: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
    pub const AES_128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
    pub const AES_192_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes192-gcm";
    pub const AES_256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";
    pub const TRIPLE_DES: &str = "http://www.w3.org/2001/04/xmlenc#tripledes-cbc";

    pub const KW_RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

    pub const HMAC_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#hmac-sha1";
    pub const HMAC_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#hmac-sha256";
}

/// 保护计划渲染为属性表时使用的键名（WSS4J `ConfigurationConstants`）。
pub mod properties {
    pub const ACTION: &str = "action";
    pub const SIGNATURE_PARTS: &str = "signatureParts";
    pub const ENCRYPTION_PARTS: &str = "encryptionParts";
    pub const ENC_KEY_ID: &str = "encryptionKeyIdentifier";
    pub const ENC_KEY_TRANSPORT: &str = "encryptionKeyTransportAlgorithm";
    pub const ENC_SYM_ALGO: &str = "encryptionSymAlgorithm";
    pub const ENCRYPTION_USER: &str = "encryptionUser";
    pub const SIG_KEY_ID: &str = "signatureKeyIdentifier";
    pub const INCLUDE_SIGNATURE_TOKEN: &str = "includeSignatureToken";
    pub const SIG_ALGO: &str = "signatureAlgorithm";
    pub const SIG_KEY_DIGEST: &str = "signatureKeyDigest";
}
