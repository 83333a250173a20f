//! LiveReload wire protocol.
//!
//! Every frame is a UTF-8 JSON object carrying a `command` field. Clients
//! only ever trigger a reply with `hello`; the server pushes `reload` and
//! `alert` commands on its own.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Protocol identifiers announced in the `hello` reply, in order.
pub const PROTOCOLS: [&str; 2] = [
    "http://livereload.com/protocols/connection-check-1",
    "http://livereload.com/protocols/official-7",
];

/// Message received from a client.
///
/// Only `command` is read; any other fields are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundMessage {
    command: String,
}

impl InboundMessage {
    /// Parse a raw text frame. Returns `None` for anything that is not a JSON
    /// object with a string `command`.
    pub(crate) fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }

    pub(crate) fn is_hello(&self) -> bool {
        self.command == "hello"
    }

    pub(crate) fn command(&self) -> &str {
        &self.command
    }
}

/// Command pushed from the server to clients.
///
/// `command` and `serverName` are written by [`Envelope`], so no variant can
/// shadow them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundCommand {
    /// Handshake reply.
    Hello { protocols: Vec<String> },
    /// Ask clients to reload `path`.
    Reload { path: String, live_css: bool },
    /// Show `message` to the user.
    Alert { message: String },
}

impl OutboundCommand {
    /// The `hello` reply with the supported protocols.
    pub fn hello() -> Self {
        Self::Hello {
            protocols: PROTOCOLS.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    /// A `reload` for `path`. CSS is always reloaded in place.
    pub fn reload(path: impl Into<String>) -> Self {
        Self::Reload {
            path: path.into(),
            live_css: true,
        }
    }

    /// An `alert` showing `message` in the browser.
    pub fn alert(message: impl Into<String>) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    /// Value of the `command` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Reload { .. } => "reload",
            Self::Alert { .. } => "alert",
        }
    }

    /// Serialize as a JSON frame stamped with `server_name`.
    pub(crate) fn to_json(&self, server_name: &str) -> serde_json::Result<String> {
        serde_json::to_string(&Envelope {
            server_name,
            command: self,
        })
    }
}

/// Outbound frame: fixed fields first, then the command's own fields.
struct Envelope<'a> {
    server_name: &'a str,
    command: &'a OutboundCommand,
}

impl Serialize for Envelope<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("command", self.command.name())?;
        map.serialize_entry("serverName", self.server_name)?;
        match self.command {
            OutboundCommand::Hello { protocols } => {
                map.serialize_entry("protocols", protocols)?;
            }
            OutboundCommand::Reload { path, live_css } => {
                map.serialize_entry("path", path)?;
                map.serialize_entry("liveCSS", live_css)?;
            }
            OutboundCommand::Alert { message } => {
                map.serialize_entry("message", message)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn to_value(command: &OutboundCommand) -> serde_json::Value {
        let json = command.to_json("livereload-server").unwrap();
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_hello_frame() {
        assert_eq!(
            to_value(&OutboundCommand::hello()),
            json!({
                "command": "hello",
                "serverName": "livereload-server",
                "protocols": [
                    "http://livereload.com/protocols/connection-check-1",
                    "http://livereload.com/protocols/official-7"
                ]
            })
        );
    }

    #[test]
    fn test_reload_frame() {
        assert_eq!(
            to_value(&OutboundCommand::reload("index.js")),
            json!({
                "command": "reload",
                "serverName": "livereload-server",
                "path": "index.js",
                "liveCSS": true
            })
        );
    }

    #[test]
    fn test_alert_frame() {
        assert_eq!(
            to_value(&OutboundCommand::alert("hello world")),
            json!({
                "command": "alert",
                "serverName": "livereload-server",
                "message": "hello world"
            })
        );
    }

    #[test]
    fn test_fixed_fields_come_first() {
        let json = OutboundCommand::alert("hi").to_json("srv").unwrap();
        assert_eq!(json, r#"{"command":"alert","serverName":"srv","message":"hi"}"#);
    }

    #[test]
    fn test_path_cannot_shadow_command() {
        let value = to_value(&OutboundCommand::reload("command"));
        assert_eq!(value["command"], "reload");
        assert_eq!(value["path"], "command");
    }

    #[test]
    fn test_parse_hello() {
        let message = InboundMessage::parse(r#"{"command":"hello"}"#).unwrap();
        assert!(message.is_hello());
    }

    #[test]
    fn test_parse_hello_with_extra_fields() {
        let payload = r#"{"command":"hello","protocols":["http://livereload.com/protocols/official-7"]}"#;
        let message = InboundMessage::parse(payload).unwrap();
        assert!(message.is_hello());
    }

    #[test]
    fn test_parse_other_command() {
        let message = InboundMessage::parse(r#"{"command":"info","url":"/"}"#).unwrap();
        assert!(!message.is_hello());
        assert_eq!(message.command(), "info");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(InboundMessage::parse("not json").is_none());
        assert!(InboundMessage::parse("{}").is_none());
        assert!(InboundMessage::parse(r#"{"command":42}"#).is_none());
        assert!(InboundMessage::parse(r#""hello""#).is_none());
    }
}
