//! 安全部件（Secure Part）：需要签名或加密的报文区域。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::names;

/// 限定名：命名空间 URI + 本地名。
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct QName {
    namespace: String,
    local_name: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

/// 部件修饰符，决定保护整个元素、仅元素内容，还是按名称定位的头部。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Modifier {
    Element,
    Content,
    Header,
}

impl Modifier {
    /// 描述符中使用的线上名称。
    pub fn as_str(self) -> &'static str {
        match self {
            Modifier::Element => "Element",
            Modifier::Content => "Content",
            Modifier::Header => "Header",
        }
    }
}

/// 部件所属的保护区域。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PartRegion {
    Signed,
    Encrypted,
}

/// 一个待签名或待加密的报文区域。
///
/// 每次运行临时构造，立即交给 [`ActionPlanBuilder`](crate::plan::ActionPlanBuilder) 编码，不做持久化。
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct SecurePart {
    name: QName,
    modifier: Modifier,
    region: PartRegion,
}

impl SecurePart {
    pub fn new(name: QName, modifier: Modifier, region: PartRegion) -> Self {
        Self {
            name,
            modifier,
            region,
        }
    }

    /// 以整元素方式签名的部件。
    pub fn signed(name: QName) -> Self {
        Self::new(name, Modifier::Element, PartRegion::Signed)
    }

    pub fn encrypted(name: QName, modifier: Modifier) -> Self {
        Self::new(name, modifier, PartRegion::Encrypted)
    }

    /// `wsu:Timestamp`，签名区域。
    pub fn timestamp() -> Self {
        Self::signed(QName::new(names::NS_WSU10, names::LN_TIMESTAMP))
    }

    /// `ds:Signature`，以整元素加密。
    pub fn signature_element() -> Self {
        Self::encrypted(
            QName::new(names::NS_DSIG, names::LN_SIGNATURE),
            Modifier::Element,
        )
    }

    /// `wsse:BinarySecurityToken`，签名区域。
    pub fn binary_security_token() -> Self {
        Self::signed(QName::new(names::NS_WSSE10, names::LN_BINARY_SECURITY_TOKEN))
    }

    /// `wsse11:SignatureConfirmation`，签名区域。
    pub fn signature_confirmation() -> Self {
        Self::signed(QName::new(names::NS_WSSE11, names::LN_SIGNATURE_CONFIRMATION))
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    pub fn region(&self) -> PartRegion {
        self.region
    }
}
