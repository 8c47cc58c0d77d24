//! # Socket Wire Format
//!
//! Socket.IO v4 packets carried in Engine.IO v4 text frames over a plain
//! websocket.
//!
//! ## Frame Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Engine.IO         Socket.IO (inside type 4)                            │
//! │  ─────────         ─────────────────────────────────────────────────    │
//! │  0{json}  open     0[/ns,]{sid}            connect (ack from server)    │
//! │  1        close    1[/ns,]                 disconnect                   │
//! │  2        ping     2[/ns,][ack]["ev",...]  event                        │
//! │  3        pong     3[/ns,]ack[...]         ack                          │
//! │  4<sio>   message  4[/ns,]{message}        connect error                │
//! │  5        upgrade  5/6                     binary (unsupported)         │
//! │  6        noop                                                          │
//! │                                                                         │
//! │  Handshake:                                                             │
//! │    server ─► 0{"sid":..,"pingInterval":25000,"pingTimeout":20000}      │
//! │    client ─► 40                                                         │
//! │    server ─► 40{"sid":"..."}           (socket connected)              │
//! │    client ─► 42["join_store",8]                                        │
//! │    server ─► 2   client ─► 3           (heartbeat, server initiated)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_NAMESPACE: &str = "/";

// =============================================================================
// Engine.IO
// =============================================================================

/// Payload of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// Longest the server may stay silent before the link counts as dead.
    pub fn heartbeat_deadline(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

// =============================================================================
// Socket.IO
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        sid: Option<String>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        name: String,
        args: Vec<Value>,
        ack: Option<u64>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        message: String,
    },
}

/// Decodes one websocket text frame.
pub fn decode(frame: &str) -> ClientResult<EnginePacket> {
    let mut chars = frame.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ClientError::Protocol("empty frame".into()))?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| ClientError::Protocol(format!("bad open packet: {e}"))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(ClientError::Protocol(format!(
            "unknown engine packet type '{other}'"
        ))),
    }
}

fn decode_socket(body: &str) -> ClientResult<SocketPacket> {
    let mut chars = body.chars();
    let kind = chars
        .next()
        .ok_or_else(|| ClientError::Protocol("empty socket packet".into()))?;
    let rest = chars.as_str();

    if matches!(kind, '5' | '6') {
        return Err(ClientError::Protocol("binary packets are not supported".into()));
    }

    let (namespace, rest) = split_namespace(rest);
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let (ack, data) = rest.split_at(digits);
    let ack = if ack.is_empty() { None } else { ack.parse::<u64>().ok() };
    let data: Option<Value> = if data.is_empty() {
        None
    } else {
        Some(
            serde_json::from_str(data)
                .map_err(|e| ClientError::Protocol(format!("bad packet data: {e}")))?,
        )
    };

    match kind {
        '0' => Ok(SocketPacket::Connect {
            namespace,
            sid: data
                .as_ref()
                .and_then(|d| d.get("sid"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match data {
                Some(Value::Array(items)) => items,
                _ => return Err(ClientError::Protocol("event without an array body".into())),
            };
            if args.is_empty() {
                return Err(ClientError::Protocol("event without a name".into()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => {
                    return Err(ClientError::Protocol(format!("event name is not a string: {other}")))
                }
            };
            Ok(SocketPacket::Event {
                namespace,
                name,
                args,
                ack,
            })
        }
        '3' => Ok(SocketPacket::Ack {
            namespace,
            id: ack.ok_or_else(|| ClientError::Protocol("ack without an id".into()))?,
            args: match data {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
        }),
        '4' => Ok(SocketPacket::ConnectError {
            namespace,
            message: match data {
                Some(Value::Object(map)) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                Some(Value::String(s)) => s,
                _ => String::new(),
            },
        }),
        other => Err(ClientError::Protocol(format!(
            "unknown socket packet type '{other}'"
        ))),
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if !rest.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), rest);
    }
    match rest.split_once(',') {
        Some((ns, tail)) => (ns.to_string(), tail),
        None => (rest.to_string(), ""),
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace.is_empty() || namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{namespace},")
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Client CONNECT for a namespace.
pub fn encode_connect(namespace: &str) -> String {
    format!("40{}", namespace_prefix(namespace))
}

pub fn encode_event(namespace: &str, name: &str, payload: &Value) -> ClientResult<String> {
    let body = serde_json::to_string(&[Value::String(name.to_string()), payload.clone()])?;
    Ok(format!("42{}{}", namespace_prefix(namespace), body))
}

/// Answer to an engine ping, echoing its payload.
pub fn encode_pong(data: &str) -> String {
    format!("3{data}")
}

pub fn encode_close() -> String {
    "1".to_string()
}

/// Builds the websocket URL for a server origin.
///
/// `http`/`https` become `ws`/`wss`, an empty path becomes `/socket.io/`, and
/// the Engine.IO query is set.
pub fn engine_url(base: &str) -> ClientResult<String> {
    let mut url = url::Url::parse(base)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::InvalidUrl(format!(
                "unsupported socket scheme: {other}"
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ClientError::InvalidUrl(base.to_string()))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url.to_string())
}

// =============================================================================
// Typed Notifications
// =============================================================================

pub const EVENT_NEW_ORDER: &str = "new_order";
pub const EVENT_ORDER_UPDATED: &str = "order_updated";

/// Server event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    NewOrder { payload: Value },
    OrderUpdated { payload: Value },
    Other { name: String, payload: Value },
}

impl NotificationEvent {
    pub fn from_event(name: String, mut args: Vec<Value>) -> Self {
        let payload = if args.is_empty() {
            Value::Null
        } else {
            args.swap_remove(0)
        };
        match name.as_str() {
            EVENT_NEW_ORDER => NotificationEvent::NewOrder { payload },
            EVENT_ORDER_UPDATED => NotificationEvent::OrderUpdated { payload },
            _ => NotificationEvent::Other { name, payload },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NotificationEvent::NewOrder { .. } => EVENT_NEW_ORDER,
            NotificationEvent::OrderUpdated { .. } => EVENT_ORDER_UPDATED,
            NotificationEvent::Other { name, .. } => name,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            NotificationEvent::NewOrder { payload }
            | NotificationEvent::OrderUpdated { payload }
            | NotificationEvent::Other { payload, .. } => payload,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet =
            decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":300,"pingTimeout":200,"maxPayload":1000}"#)
                .unwrap();
        match packet {
            EnginePacket::Open(info) => {
                assert_eq!(info.sid, "abc");
                assert_eq!(info.heartbeat_deadline(), Duration::from_millis(500));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_connect_and_event() {
        assert_eq!(
            decode(r#"40{"sid":"s1"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::Connect {
                namespace: "/".into(),
                sid: Some("s1".into())
            })
        );

        assert_eq!(
            decode(r#"42["new_order",{"id":5}]"#).unwrap(),
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/".into(),
                name: "new_order".into(),
                args: vec![json!({"id": 5})],
                ack: None,
            })
        );

        assert_eq!(
            decode(r#"42/admin,7["ping_me"]"#).unwrap(),
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/admin".into(),
                name: "ping_me".into(),
                args: vec![],
                ack: Some(7),
            })
        );
    }

    #[test]
    fn test_decode_heartbeat_and_errors() {
        assert_eq!(decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(decode("6").unwrap(), EnginePacket::Noop);
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::ConnectError {
                namespace: "/".into(),
                message: "Not authorized".into()
            })
        );
        assert!(decode("").is_err());
        assert!(decode("9").is_err());
        assert!(decode("42{}").is_err());
        assert!(decode("451-[\"x\",{}]").is_err());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_connect("/"), "40");
        assert_eq!(encode_connect("/admin"), "40/admin,");
        assert_eq!(encode_event("/", "join_store", &json!(8)).unwrap(), r#"42["join_store",8]"#);
        assert_eq!(encode_pong("probe"), "3probe");
    }

    #[test]
    fn test_engine_url() {
        assert_eq!(
            engine_url("http://localhost:3000").unwrap(),
            "ws://localhost:3000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            engine_url("https://api.example.com/rt/").unwrap(),
            "wss://api.example.com/rt/?EIO=4&transport=websocket"
        );
        assert!(engine_url("ftp://x").is_err());
    }

    #[test]
    fn test_notification_event_mapping() {
        let event = NotificationEvent::from_event("new_order".into(), vec![json!({"id": 1})]);
        assert!(matches!(event, NotificationEvent::NewOrder { .. }));
        assert_eq!(event.payload()["id"], 1);

        let event = NotificationEvent::from_event("driver_assigned".into(), vec![]);
        assert_eq!(event.name(), "driver_assigned");
        assert_eq!(event.payload(), &Value::Null);
    }
}
