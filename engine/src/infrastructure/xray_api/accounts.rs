//! Protobuf encoding of derived accounts for live user operations

use super::proto::{accounts, protocol, proxyman, serial, to_typed_message};
use crate::domain::entities::Account;

const VLESS_ENCRYPTION: &str = "none";

/// Typed account message the engine expects inside a `User`
pub fn account_message(account: &Account) -> serial::TypedMessage {
    match account {
        Account::Vmess(a) => to_typed_message(
            accounts::VMESS,
            &accounts::VmessAccount {
                id: a.id.to_string(),
            },
        ),
        Account::Vless(a) => to_typed_message(
            accounts::VLESS,
            &accounts::VlessAccount {
                id: a.id.to_string(),
                flow: a.flow.clone(),
                encryption: VLESS_ENCRYPTION.to_string(),
            },
        ),
        Account::Trojan(a) => to_typed_message(
            accounts::TROJAN,
            &accounts::TrojanAccount {
                password: a.password.clone(),
            },
        ),
        Account::Shadowsocks(a) => to_typed_message(
            accounts::SHADOWSOCKS,
            &accounts::ShadowsocksAccount {
                password: a.password.clone(),
                cipher_type: a.cipher() as i32,
                iv_check: false,
            },
        ),
        Account::Shadowsocks2022(a) => to_typed_message(
            accounts::SHADOWSOCKS_2022,
            &accounts::Shadowsocks2022Account {
                key: a.password.clone(),
            },
        ),
    }
}

pub fn add_user_operation(account: &Account) -> serial::TypedMessage {
    let user = protocol::User {
        level: account.level(),
        email: account.email().to_string(),
        account: Some(account_message(account)),
    };
    to_typed_message(
        proxyman::ADD_USER_OPERATION,
        &proxyman::AddUserOperation { user: Some(user) },
    )
}

pub fn remove_user_operation(email: &str) -> serial::TypedMessage {
    to_typed_message(
        proxyman::REMOVE_USER_OPERATION,
        &proxyman::RemoveUserOperation {
            email: email.to_string(),
        },
    )
}
