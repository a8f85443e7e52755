//! Inbound listener entity
//!
//! An inbound keeps the declared document fields it does not manage untouched,
//! and owns a typed client list selected once from its protocol. The client
//! list sits behind its own read/write lock so that user sync (single writer)
//! and document serialization (readers) never observe a half-written list.

use crate::constants::api;
use crate::domain::entities::account::{
    Account, Shadowsocks2022Account, ShadowsocksAccount, TrojanAccount, VlessAccount,
    VmessAccount,
};
use crate::domain::value_objects::{Protocol, SHADOWSOCKS_2022_PREFIX};
use crate::domain::{DomainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const CLIENTS_KEY: &str = "clients";

/// Raw inbound as it appears in the engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundDocument {
    #[serde(default)]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<Value>,
    pub protocol: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(
        rename = "streamSettings",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub stream_settings: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client list shape of an inbound, fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    Shadowsocks2022 { method: String },
    Unmanaged,
}

impl InboundKind {
    fn from_document(doc: &InboundDocument) -> Self {
        match Protocol::parse(&doc.protocol) {
            Protocol::Vmess => InboundKind::Vmess,
            Protocol::Vless => InboundKind::Vless,
            Protocol::Trojan => InboundKind::Trojan,
            Protocol::Shadowsocks => match doc.settings.get("method").and_then(Value::as_str) {
                Some(method) if method.starts_with(SHADOWSOCKS_2022_PREFIX) => {
                    InboundKind::Shadowsocks2022 {
                        method: method.to_string(),
                    }
                }
                _ => InboundKind::Shadowsocks,
            },
            Protocol::Other(_) => InboundKind::Unmanaged,
        }
    }
}

/// Typed client list of one inbound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientList {
    /// Clients (if any) stay in the raw settings document
    Unmanaged,
    Vmess(Vec<VmessAccount>),
    Vless(Vec<VlessAccount>),
    Trojan(Vec<TrojanAccount>),
    Shadowsocks(Vec<ShadowsocksAccount>),
    Shadowsocks2022(Vec<Shadowsocks2022Account>),
}

impl ClientList {
    pub fn empty_for(kind: &InboundKind) -> Self {
        match kind {
            InboundKind::Vmess => ClientList::Vmess(Vec::new()),
            InboundKind::Vless => ClientList::Vless(Vec::new()),
            InboundKind::Trojan => ClientList::Trojan(Vec::new()),
            InboundKind::Shadowsocks => ClientList::Shadowsocks(Vec::new()),
            InboundKind::Shadowsocks2022 { .. } => ClientList::Shadowsocks2022(Vec::new()),
            InboundKind::Unmanaged => ClientList::Unmanaged,
        }
    }

    /// Build a list of the given shape from accounts; accounts of another shape are skipped
    pub fn from_accounts(kind: &InboundKind, accounts: impl IntoIterator<Item = Account>) -> Self {
        let mut list = Self::empty_for(kind);
        for account in accounts {
            list.push(account);
        }
        list
    }

    fn push(&mut self, account: Account) -> bool {
        match (self, account) {
            (ClientList::Vmess(v), Account::Vmess(a)) => v.push(a),
            (ClientList::Vless(v), Account::Vless(a)) => v.push(a),
            (ClientList::Trojan(v), Account::Trojan(a)) => v.push(a),
            (ClientList::Shadowsocks(v), Account::Shadowsocks(a)) => v.push(a),
            (ClientList::Shadowsocks2022(v), Account::Shadowsocks2022(a)) => v.push(a),
            _ => return false,
        }
        true
    }

    /// Replace any entry with the same email, appending the account at the end.
    /// Returns false when the account does not match the list's shape.
    pub fn upsert(&mut self, account: Account) -> bool {
        if !self.accepts(&account) {
            return false;
        }
        self.remove(account.email());
        self.push(account)
    }

    fn accepts(&self, account: &Account) -> bool {
        matches!(
            (self, account),
            (ClientList::Vmess(_), Account::Vmess(_))
                | (ClientList::Vless(_), Account::Vless(_))
                | (ClientList::Trojan(_), Account::Trojan(_))
                | (ClientList::Shadowsocks(_), Account::Shadowsocks(_))
                | (ClientList::Shadowsocks2022(_), Account::Shadowsocks2022(_))
        )
    }

    pub fn remove(&mut self, email: &str) {
        match self {
            ClientList::Vmess(v) => v.retain(|a| a.email != email),
            ClientList::Vless(v) => v.retain(|a| a.email != email),
            ClientList::Trojan(v) => v.retain(|a| a.email != email),
            ClientList::Shadowsocks(v) => v.retain(|a| a.email != email),
            ClientList::Shadowsocks2022(v) => v.retain(|a| a.email != email),
            ClientList::Unmanaged => {}
        }
    }

    pub fn emails(&self) -> Vec<&str> {
        match self {
            ClientList::Vmess(v) => v.iter().map(|a| a.email.as_str()).collect(),
            ClientList::Vless(v) => v.iter().map(|a| a.email.as_str()).collect(),
            ClientList::Trojan(v) => v.iter().map(|a| a.email.as_str()).collect(),
            ClientList::Shadowsocks(v) => v.iter().map(|a| a.email.as_str()).collect(),
            ClientList::Shadowsocks2022(v) => v.iter().map(|a| a.email.as_str()).collect(),
            ClientList::Unmanaged => Vec::new(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails().contains(&email)
    }

    pub fn len(&self) -> usize {
        self.emails().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_value(&self) -> serde_json::Result<Option<Value>> {
        let value = match self {
            ClientList::Vmess(v) => serde_json::to_value(v)?,
            ClientList::Vless(v) => serde_json::to_value(v)?,
            ClientList::Trojan(v) => serde_json::to_value(v)?,
            ClientList::Shadowsocks(v) => serde_json::to_value(v)?,
            ClientList::Shadowsocks2022(v) => serde_json::to_value(v)?,
            ClientList::Unmanaged => return Ok(None),
        };
        Ok(Some(value))
    }
}

#[derive(Debug)]
pub struct Inbound {
    document: InboundDocument,
    kind: InboundKind,
    excluded: bool,
    clients: RwLock<ClientList>,
}

impl Inbound {
    /// Managed inbounds drop the declared clients; the directory is their only source
    pub fn from_document(mut document: InboundDocument, excluded: bool) -> Self {
        let kind = InboundKind::from_document(&document);
        let clients = if excluded {
            ClientList::Unmanaged
        } else {
            ClientList::empty_for(&kind)
        };
        if clients != ClientList::Unmanaged {
            document.settings.remove(CLIENTS_KEY);
        }
        Self {
            document,
            kind,
            excluded,
            clients: RwLock::new(clients),
        }
    }

    /// Loopback dokodemo-door listener carrying the agent's own control traffic
    pub fn admin(port: u16) -> Self {
        let mut settings = Map::new();
        settings.insert("address".to_string(), json!(api::LISTEN_ADDR));
        let document = InboundDocument {
            tag: api::INBOUND_TAG.to_string(),
            listen: Some(api::LISTEN_ADDR.to_string()),
            port: Some(json!(port)),
            protocol: "dokodemo-door".to_string(),
            settings,
            stream_settings: None,
            extra: Map::new(),
        };
        Self::from_document(document, true)
    }

    pub fn tag(&self) -> &str {
        &self.document.tag
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::parse(&self.document.protocol)
    }

    pub fn kind(&self) -> &InboundKind {
        &self.kind
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Whether the directory owns this inbound's client list
    pub fn is_managed(&self) -> bool {
        !self.excluded && self.kind != InboundKind::Unmanaged
    }

    pub fn settings(&self) -> &Map<String, Value> {
        &self.document.settings
    }

    pub fn stream_settings(&self) -> Option<&Map<String, Value>> {
        self.document.stream_settings.as_ref()
    }

    pub fn read_clients(&self) -> RwLockReadGuard<'_, ClientList> {
        self.clients.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_clients(&self) -> RwLockWriteGuard<'_, ClientList> {
        self.clients.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current client list
    pub fn clients(&self) -> ClientList {
        self.read_clients().clone()
    }

    pub fn replace_clients(&self, clients: ClientList) {
        if !self.is_managed() {
            return;
        }
        *self.write_clients() = clients;
    }

    pub fn upsert_client(&self, account: Account) -> bool {
        if !self.is_managed() {
            return false;
        }
        self.write_clients().upsert(account)
    }

    pub fn remove_client(&self, email: &str) {
        if !self.is_managed() {
            return;
        }
        self.write_clients().remove(email);
    }

    /// Render the inbound with the given client list injected into its settings
    pub fn to_value_with(&self, clients: &ClientList) -> Result<Value> {
        let mut document = self.document.clone();
        let rendered = clients
            .to_value()
            .map_err(|e| DomainError::InvalidConfiguration(e.to_string()))?;
        if let Some(list) = rendered {
            document.settings.insert(CLIENTS_KEY.to_string(), list);
        }
        serde_json::to_value(&document).map_err(|e| DomainError::InvalidConfiguration(e.to_string()))
    }
}
