//! リソース種別

use serde::{Deserialize, Serialize};
use std::fmt;

/// リソース種別（閉じた集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    SecurityGroup,
    Instance,
    Role,
    TargetGroup,
    Listener,
    Asset,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Vpc,
        ResourceKind::Subnet,
        ResourceKind::SecurityGroup,
        ResourceKind::Instance,
        ResourceKind::Role,
        ResourceKind::TargetGroup,
        ResourceKind::Listener,
        ResourceKind::Asset,
    ];

    /// 文字列からパース
    ///
    /// `security-group` / `security_group` / `SecurityGroup` のいずれも受け付ける
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "vpc" => Some(Self::Vpc),
            "subnet" => Some(Self::Subnet),
            "securitygroup" => Some(Self::SecurityGroup),
            "instance" => Some(Self::Instance),
            "role" => Some(Self::Role),
            "targetgroup" => Some(Self::TargetGroup),
            "listener" => Some(Self::Listener),
            "asset" => Some(Self::Asset),
            _ => None,
        }
    }

    /// KDL・出力ドキュメントで使用する表記
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security-group",
            Self::Instance => "instance",
            Self::Role => "role",
            Self::TargetGroup => "target-group",
            Self::Listener => "listener",
            Self::Asset => "asset",
        }
    }

    /// この種別が公開する出力属性
    pub fn attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Vpc => &["id", "cidr"],
            Self::Subnet => &["id", "cidr", "availability_zone"],
            Self::SecurityGroup => &["id"],
            Self::Instance => &["id", "private_ip", "role_id"],
            Self::Role => &["id", "arn"],
            Self::TargetGroup => &["id", "arn", "port"],
            Self::Listener => &["id", "arn"],
            Self::Asset => &["id", "bucket", "key"],
        }
    }

    pub fn exposes(&self, attribute: &str) -> bool {
        self.attributes().contains(&attribute)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
