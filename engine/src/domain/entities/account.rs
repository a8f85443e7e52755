//! Per-protocol credential records derived from a user
//!
//! Accounts are immutable once built. Each carries the source user's email and
//! the default access level; the JSON shape matches a client entry in the
//! engine's inbound `settings.clients` list.

use crate::domain::entities::User;
use crate::domain::value_objects::CipherType;
use crate::domain::{DomainError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access level assigned to every derived account
pub const DEFAULT_LEVEL: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmessAccount {
    pub email: String,
    pub level: u32,
    pub id: Uuid,
}

impl VmessAccount {
    /// None when the user did not opt into VMess
    pub fn from_user(user: &User) -> Result<Option<Self>> {
        let Some(settings) = user.proxies.vmess.as_ref() else {
            return Ok(None);
        };
        Ok(Some(Self {
            email: user.email.clone(),
            level: DEFAULT_LEVEL,
            id: parse_uuid(&user.email, &settings.id)?,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessAccount {
    pub email: String,
    pub level: u32,
    pub id: Uuid,
    pub flow: String,
}

impl VlessAccount {
    pub fn from_user(user: &User) -> Result<Option<Self>> {
        let Some(settings) = user.proxies.vless.as_ref() else {
            return Ok(None);
        };
        Ok(Some(Self {
            email: user.email.clone(),
            level: DEFAULT_LEVEL,
            id: parse_uuid(&user.email, &settings.id)?,
            flow: settings.flow.clone(),
        }))
    }

    pub fn without_flow(mut self) -> Self {
        self.flow.clear();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrojanAccount {
    pub email: String,
    pub level: u32,
    pub password: String,
}

impl TrojanAccount {
    pub fn from_user(user: &User) -> Option<Self> {
        user.proxies.trojan.as_ref().map(|settings| Self {
            email: user.email.clone(),
            level: DEFAULT_LEVEL,
            password: settings.password.clone(),
        })
    }
}

/// Classic Shadowsocks account with a per-user cipher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksAccount {
    pub email: String,
    pub level: u32,
    pub password: String,
    pub method: String,
}

impl ShadowsocksAccount {
    /// Unrecognized methods fall back to "none"
    pub fn from_user(user: &User) -> Option<Self> {
        user.proxies.shadowsocks.as_ref().map(|settings| {
            let cipher = CipherType::from_method(&settings.method).unwrap_or(CipherType::None);
            let method = if cipher == CipherType::None {
                CipherType::None.as_str().to_string()
            } else {
                settings.method.clone()
            };
            Self {
                email: user.email.clone(),
                level: DEFAULT_LEVEL,
                password: settings.password.clone(),
                method,
            }
        })
    }

    pub fn cipher(&self) -> CipherType {
        CipherType::from_method(&self.method).unwrap_or(CipherType::None)
    }
}

/// Shadowsocks-2022 account; the password is a base64 key sized for the inbound's method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shadowsocks2022Account {
    pub email: String,
    pub level: u32,
    pub password: String,
}

impl Shadowsocks2022Account {
    /// The raw password; key normalization happens per inbound
    pub fn from_user(user: &User) -> Option<Self> {
        user.proxies.shadowsocks.as_ref().map(|settings| Self {
            email: user.email.clone(),
            level: DEFAULT_LEVEL,
            password: settings.password.clone(),
        })
    }
}

/// A derived account for one protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Vmess(VmessAccount),
    Vless(VlessAccount),
    Trojan(TrojanAccount),
    Shadowsocks(ShadowsocksAccount),
    Shadowsocks2022(Shadowsocks2022Account),
}

impl Account {
    pub fn email(&self) -> &str {
        match self {
            Account::Vmess(a) => &a.email,
            Account::Vless(a) => &a.email,
            Account::Trojan(a) => &a.email,
            Account::Shadowsocks(a) => &a.email,
            Account::Shadowsocks2022(a) => &a.email,
        }
    }

    pub fn level(&self) -> u32 {
        match self {
            Account::Vmess(a) => a.level,
            Account::Vless(a) => a.level,
            Account::Trojan(a) => a.level,
            Account::Shadowsocks(a) => a.level,
            Account::Shadowsocks2022(a) => a.level,
        }
    }
}

fn parse_uuid(email: &str, raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| DomainError::InvalidAccount {
        email: email.to_string(),
        reason: format!("invalid id '{}': {}", raw, e),
    })
}
