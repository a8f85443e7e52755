//! Account derivation and per-inbound eligibility

use crate::domain::entities::{
    Account, Inbound, InboundKind, Shadowsocks2022Account, ShadowsocksAccount, TrojanAccount,
    User, VlessAccount, VmessAccount,
};
use crate::domain::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

const FLOW_NETWORKS: [&str; 3] = ["tcp", "raw", "kcp"];
const FLOW_SECURITIES: [&str; 2] = ["tls", "reality"];

/// Every account a user opted into, derived once per sync pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyAccounts {
    pub vmess: Option<VmessAccount>,
    pub vless: Option<VlessAccount>,
    pub trojan: Option<TrojanAccount>,
    pub shadowsocks: Option<ShadowsocksAccount>,
    pub shadowsocks_2022: Option<Shadowsocks2022Account>,
}

impl ProxyAccounts {
    /// Identifiers that are not UUIDs leave that protocol out, with a warning
    pub fn from_user(user: &User) -> Self {
        Self {
            vmess: skip_invalid(user, VmessAccount::from_user(user)),
            vless: skip_invalid(user, VlessAccount::from_user(user)),
            trojan: TrojanAccount::from_user(user),
            shadowsocks: ShadowsocksAccount::from_user(user),
            shadowsocks_2022: Shadowsocks2022Account::from_user(user),
        }
    }

    /// Account for `inbound`, normalized for its transport and cipher.
    /// None when the inbound is not managed or the user has no matching credentials.
    pub fn for_inbound(&self, inbound: &Inbound) -> Option<Account> {
        if !inbound.is_managed() {
            return None;
        }
        match inbound.kind() {
            InboundKind::Vmess => self.vmess.clone().map(Account::Vmess),
            InboundKind::Vless => self.vless.clone().map(|account| {
                if account.flow.is_empty() || supports_flow(inbound.stream_settings()) {
                    Account::Vless(account)
                } else {
                    Account::Vless(account.without_flow())
                }
            }),
            InboundKind::Trojan => self.trojan.clone().map(Account::Trojan),
            InboundKind::Shadowsocks => self.shadowsocks.clone().map(Account::Shadowsocks),
            InboundKind::Shadowsocks2022 { method } => {
                self.shadowsocks_2022.clone().map(|mut account| {
                    account.password = ensure_base64_password(&account.password, method);
                    Account::Shadowsocks2022(account)
                })
            }
            InboundKind::Unmanaged => None,
        }
    }
}

fn skip_invalid<T>(user: &User, derived: Result<Option<T>>) -> Option<T> {
    derived.unwrap_or_else(|e| {
        warn!(email = %user.email, error = %e, "Skipping invalid account");
        None
    })
}

/// Account `user` should hold on `inbound`, if any: the user must list the
/// inbound's tag and have credentials for its protocol.
pub fn eligible_account(inbound: &Inbound, user: &User, accounts: &ProxyAccounts) -> Option<Account> {
    if !user.is_member_of(inbound.tag()) {
        return None;
    }
    accounts.for_inbound(inbound)
}

/// Whether a VLess flow can be kept on an inbound with these stream settings.
///
/// Requires a raw/tcp/kcp transport secured with tls or reality, and no
/// HTTP header obfuscation on the raw transport.
pub fn supports_flow(stream_settings: Option<&Map<String, Value>>) -> bool {
    let Some(stream) = stream_settings else {
        return false;
    };

    let network = stream.get("network").and_then(Value::as_str);
    if !network.is_some_and(|n| FLOW_NETWORKS.contains(&n)) {
        return false;
    }

    let security = stream.get("security").and_then(Value::as_str);
    if !security.is_some_and(|s| FLOW_SECURITIES.contains(&s)) {
        return false;
    }

    let header_type = stream
        .get("rawSettings")
        .or_else(|| stream.get("tcpSettings"))
        .and_then(|raw| raw.get("header"))
        .and_then(|header| header.get("type").or_else(|| header.get("Type")))
        .and_then(Value::as_str);

    header_type != Some("http")
}

/// Normalize a Shadowsocks-2022 password into a base64 key of the length the method needs.
///
/// A password that already decodes to the right length is returned as is;
/// anything else is hashed with SHA-256 and truncated.
pub fn ensure_base64_password(password: &str, method: &str) -> String {
    let key_len = key_length(method);

    if let Ok(decoded) = STANDARD.decode(password) {
        if Some(decoded.len()) == key_len {
            return password.to_string();
        }
    }

    let hash = Sha256::digest(password.as_bytes());
    STANDARD.encode(&hash[..key_len.unwrap_or(32)])
}

fn key_length(method: &str) -> Option<usize> {
    if method.contains("aes-128-gcm") {
        Some(16)
    } else if method.contains("aes-256-gcm") || method.contains("chacha20-poly1305") {
        Some(32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::InboundDocument;
    use serde_json::json;

    const ID: &str = "5a2f7a4e-8e3b-4c7d-9f10-2b6c1d3e4f50";
    const AES_128: &str = "2022-blake3-aes-128-gcm";
    const AES_256: &str = "2022-blake3-aes-256-gcm";
    const CHACHA: &str = "2022-blake3-chacha20-poly1305";

    fn stream(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn inbound(value: Value) -> Inbound {
        let doc: InboundDocument = serde_json::from_value(value).unwrap();
        Inbound::from_document(doc, false)
    }

    fn decoded_len(key: &str) -> usize {
        STANDARD.decode(key).unwrap().len()
    }

    #[test]
    fn test_flow_kept_on_tcp_reality() {
        let s = stream(json!({"network": "tcp", "security": "reality"}));
        assert!(supports_flow(Some(&s)));
    }

    #[test]
    fn test_flow_cleared_on_each_violation() {
        let cases = [
            json!({"network": "tcp", "security": "none"}),
            json!({"network": "ws", "security": "tls"}),
            json!({"security": "tls"}),
            json!({"network": "raw"}),
            json!({"network": "tcp", "security": "tls", "tcpSettings": {"header": {"type": "http"}}}),
            json!({"network": "raw", "security": "reality", "rawSettings": {"header": {"Type": "http"}}}),
        ];
        for case in cases {
            assert!(!supports_flow(Some(&stream(case.clone()))), "{case}");
        }
        assert!(!supports_flow(None));
    }

    #[test]
    fn test_flow_kept_with_plain_header() {
        let s = stream(json!({"network": "kcp", "security": "tls", "tcpSettings": {"header": {"type": "none"}}}));
        assert!(supports_flow(Some(&s)));
    }

    #[test]
    fn test_vless_flow_per_inbound() {
        let user = User::new("a@b")
            .with_inbounds(["REALITY", "PLAIN"])
            .with_vless(ID, "xtls-rprx-vision");
        let accounts = ProxyAccounts::from_user(&user);

        let reality = inbound(json!({
            "tag": "REALITY", "protocol": "vless",
            "streamSettings": {"network": "tcp", "security": "reality"}
        }));
        let plain = inbound(json!({
            "tag": "PLAIN", "protocol": "vless",
            "streamSettings": {"network": "tcp", "security": "none"}
        }));

        match eligible_account(&reality, &user, &accounts) {
            Some(Account::Vless(a)) => assert_eq!(a.flow, "xtls-rprx-vision"),
            other => panic!("unexpected {other:?}"),
        }
        match eligible_account(&plain, &user, &accounts) {
            Some(Account::Vless(a)) => assert_eq!(a.flow, ""),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_eligibility_requires_membership_and_credentials() {
        let trojan = inbound(json!({"tag": "T", "protocol": "trojan"}));
        let member = User::new("a@b").with_inbounds(["T"]).with_trojan("pw");
        let outsider = User::new("c@d").with_trojan("pw");
        let no_creds = User::new("e@f").with_inbounds(["T"]).with_vmess(ID);

        for (user, expected) in [(&member, true), (&outsider, false), (&no_creds, false)] {
            let accounts = ProxyAccounts::from_user(user);
            assert_eq!(
                eligible_account(&trojan, user, &accounts).is_some(),
                expected,
                "{}",
                user.email
            );
        }
    }

    #[test]
    fn test_invalid_uuid_is_skipped() {
        let user = User::new("a@b").with_vmess("nope").with_trojan("pw");
        let accounts = ProxyAccounts::from_user(&user);
        assert!(accounts.vmess.is_none());
        assert!(accounts.trojan.is_some());
    }

    #[test]
    fn test_shadowsocks_shape_follows_inbound_method() {
        let user = User::new("a@b")
            .with_inbounds(["SS", "SS2022"])
            .with_shadowsocks("secret", "aes-256-gcm");
        let accounts = ProxyAccounts::from_user(&user);

        let classic = inbound(json!({"tag": "SS", "protocol": "shadowsocks", "settings": {"method": "aes-256-gcm"}}));
        let modern = inbound(json!({"tag": "SS2022", "protocol": "shadowsocks", "settings": {"method": AES_128}}));

        assert!(matches!(
            eligible_account(&classic, &user, &accounts),
            Some(Account::Shadowsocks(_))
        ));
        match eligible_account(&modern, &user, &accounts) {
            Some(Account::Shadowsocks2022(a)) => assert_eq!(decoded_len(&a.password), 16),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_base64_password_lengths() {
        assert_eq!(decoded_len(&ensure_base64_password("hunter2", AES_128)), 16);
        assert_eq!(decoded_len(&ensure_base64_password("hunter2", AES_256)), 32);
        assert_eq!(decoded_len(&ensure_base64_password("hunter2", CHACHA)), 32);
    }

    #[test]
    fn test_base64_password_is_idempotent_and_deterministic() {
        for method in [AES_128, AES_256, CHACHA] {
            let once = ensure_base64_password("correct horse battery staple", method);
            assert_eq!(ensure_base64_password(&once, method), once);
            assert_eq!(
                ensure_base64_password("correct horse battery staple", method),
                once
            );
        }
    }

    #[test]
    fn test_valid_key_of_wrong_length_is_rehashed() {
        let key_16 = STANDARD.encode([7u8; 16]);
        assert_eq!(ensure_base64_password(&key_16, AES_128), key_16);
        let rehashed = ensure_base64_password(&key_16, AES_256);
        assert_ne!(rehashed, key_16);
        assert_eq!(decoded_len(&rehashed), 32);
    }
}
