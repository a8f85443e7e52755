//! User records supplied by the external directory

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmessSettings {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessSettings {
    pub id: String,
    #[serde(default)]
    pub flow: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrojanSettings {
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksSettings {
    pub password: String,
    #[serde(default)]
    pub method: String,
}

/// Per-protocol credential inputs; a protocol is opted into by supplying its settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxies {
    #[serde(default)]
    pub vmess: Option<VmessSettings>,
    #[serde(default)]
    pub vless: Option<VlessSettings>,
    #[serde(default)]
    pub trojan: Option<TrojanSettings>,
    #[serde(default)]
    pub shadowsocks: Option<ShadowsocksSettings>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    /// Inbound tags this user is a member of
    #[serde(default)]
    pub inbounds: Vec<String>,
    #[serde(default)]
    pub proxies: Proxies,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_inbounds<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inbounds = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_vmess(mut self, id: impl Into<String>) -> Self {
        self.proxies.vmess = Some(VmessSettings { id: id.into() });
        self
    }

    pub fn with_vless(mut self, id: impl Into<String>, flow: impl Into<String>) -> Self {
        self.proxies.vless = Some(VlessSettings {
            id: id.into(),
            flow: flow.into(),
        });
        self
    }

    pub fn with_trojan(mut self, password: impl Into<String>) -> Self {
        self.proxies.trojan = Some(TrojanSettings {
            password: password.into(),
        });
        self
    }

    pub fn with_shadowsocks(
        mut self,
        password: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.proxies.shadowsocks = Some(ShadowsocksSettings {
            password: password.into(),
            method: method.into(),
        });
        self
    }

    pub fn is_member_of(&self, tag: &str) -> bool {
        self.inbounds.iter().any(|t| t == tag)
    }
}
