//! Protocol and cipher value objects

use std::fmt;

/// Method prefix that selects the Shadowsocks-2022 account shape
pub const SHADOWSOCKS_2022_PREFIX: &str = "2022-blake3";

/// Inbound protocol as declared in the engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
    /// Any protocol whose clients are not managed (dokodemo-door, socks, http...)
    Other(String),
}

impl Protocol {
    pub fn parse(s: &str) -> Self {
        match s {
            "vmess" => Protocol::Vmess,
            "vless" => Protocol::Vless,
            "trojan" => Protocol::Trojan,
            "shadowsocks" => Protocol::Shadowsocks,
            other => Protocol::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::Other(s) => s,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-user cipher of a classic Shadowsocks inbound.
/// Discriminants match the engine's protobuf enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherType {
    Aes128Gcm = 5,
    Aes256Gcm = 6,
    Chacha20Poly1305 = 7,
    Xchacha20Poly1305 = 8,
    None = 9,
}

impl CipherType {
    /// Parse a method name, accepting the IETF aliases
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "aes-128-gcm" => Some(CipherType::Aes128Gcm),
            "aes-256-gcm" => Some(CipherType::Aes256Gcm),
            "chacha20-poly1305" | "chacha20-ietf-poly1305" => Some(CipherType::Chacha20Poly1305),
            "xchacha20-poly1305" | "xchacha20-ietf-poly1305" => {
                Some(CipherType::Xchacha20Poly1305)
            }
            "none" => Some(CipherType::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CipherType::Aes128Gcm => "aes-128-gcm",
            CipherType::Aes256Gcm => "aes-256-gcm",
            CipherType::Chacha20Poly1305 => "chacha20-poly1305",
            CipherType::Xchacha20Poly1305 => "xchacha20-poly1305",
            CipherType::None => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse() {
        assert_eq!(Protocol::parse("vless"), Protocol::Vless);
        assert_eq!(Protocol::parse("shadowsocks"), Protocol::Shadowsocks);
        assert_eq!(
            Protocol::parse("dokodemo-door"),
            Protocol::Other("dokodemo-door".to_string())
        );
        assert_eq!(Protocol::parse("dokodemo-door").as_str(), "dokodemo-door");
    }

    #[test]
    fn test_cipher_aliases() {
        assert_eq!(
            CipherType::from_method("chacha20-ietf-poly1305"),
            Some(CipherType::Chacha20Poly1305)
        );
        assert_eq!(
            CipherType::from_method("xchacha20-ietf-poly1305"),
            Some(CipherType::Xchacha20Poly1305)
        );
        assert_eq!(CipherType::from_method("rc4-md5"), None);
        assert_eq!(CipherType::Aes256Gcm as i32, 6);
    }
}
