//! Protobuf messages of the engine's administrative services
//!
//! Only the subset the agent calls is declared; field numbers follow the
//! engine's published `.proto` files.

use std::collections::HashMap;

pub mod serial {
    /// A serialized message tagged with its full protobuf type name
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TypedMessage {
        #[prost(string, tag = "1")]
        pub r#type: ::prost::alloc::string::String,
        #[prost(bytes = "vec", tag = "2")]
        pub value: ::prost::alloc::vec::Vec<u8>,
    }
}

pub mod protocol {
    use super::serial::TypedMessage;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct User {
        #[prost(uint32, tag = "1")]
        pub level: u32,
        #[prost(string, tag = "2")]
        pub email: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "3")]
        pub account: ::core::option::Option<TypedMessage>,
    }
}

pub mod proxyman {
    use super::protocol::User;
    use super::serial::TypedMessage;

    pub const ADD_USER_OPERATION: &str = "xray.app.proxyman.command.AddUserOperation";
    pub const REMOVE_USER_OPERATION: &str = "xray.app.proxyman.command.RemoveUserOperation";

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AddUserOperation {
        #[prost(message, optional, tag = "1")]
        pub user: ::core::option::Option<User>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RemoveUserOperation {
        #[prost(string, tag = "1")]
        pub email: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AlterInboundRequest {
        #[prost(string, tag = "1")]
        pub tag: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub operation: ::core::option::Option<TypedMessage>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AlterInboundResponse {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AlterOutboundRequest {
        #[prost(string, tag = "1")]
        pub tag: ::prost::alloc::string::String,
        #[prost(message, optional, tag = "2")]
        pub operation: ::core::option::Option<TypedMessage>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AlterOutboundResponse {}
}

pub mod accounts {
    pub const VMESS: &str = "xray.proxy.vmess.Account";
    pub const VLESS: &str = "xray.proxy.vless.Account";
    pub const TROJAN: &str = "xray.proxy.trojan.Account";
    pub const SHADOWSOCKS: &str = "xray.proxy.shadowsocks.Account";
    pub const SHADOWSOCKS_2022: &str = "xray.proxy.shadowsocks_2022.Account";

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct VmessAccount {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct VlessAccount {
        #[prost(string, tag = "1")]
        pub id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub flow: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub encryption: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TrojanAccount {
        #[prost(string, tag = "1")]
        pub password: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ShadowsocksAccount {
        #[prost(string, tag = "1")]
        pub password: ::prost::alloc::string::String,
        #[prost(int32, tag = "2")]
        pub cipher_type: i32,
        #[prost(bool, tag = "3")]
        pub iv_check: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Shadowsocks2022Account {
        #[prost(string, tag = "1")]
        pub key: ::prost::alloc::string::String,
    }
}

pub mod stats {
    use super::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetStatsRequest {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(bool, tag = "2")]
        pub reset: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Stat {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(int64, tag = "2")]
        pub value: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetStatsResponse {
        #[prost(message, optional, tag = "1")]
        pub stat: ::core::option::Option<Stat>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryStatsRequest {
        #[prost(string, tag = "1")]
        pub pattern: ::prost::alloc::string::String,
        #[prost(bool, tag = "2")]
        pub reset: bool,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct QueryStatsResponse {
        #[prost(message, repeated, tag = "1")]
        pub stat: ::prost::alloc::vec::Vec<Stat>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SysStatsRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SysStatsResponse {
        #[prost(uint32, tag = "1")]
        pub num_goroutine: u32,
        #[prost(uint32, tag = "2")]
        pub num_gc: u32,
        #[prost(uint64, tag = "3")]
        pub alloc: u64,
        #[prost(uint64, tag = "4")]
        pub total_alloc: u64,
        #[prost(uint64, tag = "5")]
        pub sys: u64,
        #[prost(uint64, tag = "6")]
        pub mallocs: u64,
        #[prost(uint64, tag = "7")]
        pub frees: u64,
        #[prost(uint64, tag = "8")]
        pub live_objects: u64,
        #[prost(uint64, tag = "9")]
        pub pause_total_ns: u64,
        #[prost(uint32, tag = "10")]
        pub uptime: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetStatsOnlineIpListResponse {
        #[prost(string, tag = "1")]
        pub name: ::prost::alloc::string::String,
        #[prost(map = "string, int64", tag = "2")]
        pub ips: HashMap<::prost::alloc::string::String, i64>,
    }
}

/// Wrap a message into a `TypedMessage` carrying its full type name
pub fn to_typed_message<T: prost::Message>(type_name: &str, msg: &T) -> serial::TypedMessage {
    serial::TypedMessage {
        r#type: type_name.to_string(),
        value: msg.encode_to_vec(),
    }
}
