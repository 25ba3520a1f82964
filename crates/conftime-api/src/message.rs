// NETCONF message construction and reply parsing
//
// Outgoing messages are small and built with `format!`; replies are parsed
// with `roxmltree`. Element matching is by local name so replies work the
// same whether or not the device qualifies them with the base namespace.

use strum::{Display, EnumString};

use crate::error::Error;

pub const BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
pub const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";

/// A NETCONF configuration datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Datastore {
    Running,
    Candidate,
    Startup,
}

/// The server's `<hello>`: advertised capabilities and assigned session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub capabilities: Vec<String>,
    pub session_id: Option<u32>,
}

// ── Builders ────────────────────────────────────────────────────────

/// The client `<hello>`. Only base:1.0 is advertised so the session stays
/// on end-of-message framing.
pub fn client_hello() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><hello xmlns="{BASE_NS}"><capabilities><capability>{BASE_CAPABILITY}</capability></capabilities></hello>"#
    )
}

/// Wrap an operation in an `<rpc>` envelope.
pub fn rpc(message_id: u64, operation: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rpc message-id="{message_id}" xmlns="{BASE_NS}">{operation}</rpc>"#
    )
}

pub fn get_config(source: Datastore) -> String {
    format!("<get-config><source><{source}/></source></get-config>")
}

pub fn lock(target: Datastore) -> String {
    format!("<lock><target><{target}/></target></lock>")
}

pub fn unlock(target: Datastore) -> String {
    format!("<unlock><target><{target}/></target></unlock>")
}

/// `<edit-config>` with the payload inlined. Payloads rendered from
/// templates already carry their own `<config>` wrapper.
pub fn edit_config(target: Datastore, config: &str) -> String {
    let config = config.trim();
    let body = if config.starts_with("<config") {
        config.to_owned()
    } else {
        format!("<config>{config}</config>")
    };
    format!("<edit-config><target><{target}/></target>{body}</edit-config>")
}

pub fn commit() -> &'static str {
    "<commit/>"
}

pub fn close_session() -> &'static str {
    "<close-session/>"
}

/// Escape text for inclusion in element content.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

// ── Parsers ─────────────────────────────────────────────────────────

/// Parse the server's `<hello>`.
pub fn parse_hello(xml: &str) -> Result<Hello, Error> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::MalformedReply(format!("hello: {e}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "hello" {
        return Err(Error::MalformedReply(format!(
            "expected <hello>, got <{}>",
            root.tag_name().name()
        )));
    }

    let capabilities = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "capability")
        .filter_map(|n| n.text())
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .collect();

    let session_id = root
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "session-id")
        .and_then(|n| n.text())
        .and_then(|t| t.trim().parse().ok());

    Ok(Hello {
        capabilities,
        session_id,
    })
}

/// Validate an `<rpc-reply>`: correct message id and no error-severity
/// `<rpc-error>`. Warnings are tolerated.
pub fn check_reply(xml: &str, message_id: u64) -> Result<(), Error> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| Error::MalformedReply(format!("rpc-reply: {e}")))?;
    let root = doc.root_element();
    if root.tag_name().name() != "rpc-reply" {
        return Err(Error::MalformedReply(format!(
            "expected <rpc-reply>, got <{}>",
            root.tag_name().name()
        )));
    }

    if let Some(id) = root.attribute("message-id") {
        if id != message_id.to_string() {
            return Err(Error::MalformedReply(format!(
                "reply message-id {id} does not match request {message_id}"
            )));
        }
    }

    let errors = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "rpc-error");

    for err in errors {
        let field = |name: &str| {
            err.children()
                .find(|c| c.is_element() && c.tag_name().name() == name)
                .and_then(|c| c.text())
                .map(|t| t.trim().to_owned())
        };

        if field("error-severity").as_deref() == Some("warning") {
            tracing::debug!(message = ?field("error-message"), "rpc-reply warning");
            continue;
        }

        return Err(Error::Rpc {
            tag: field("error-tag").unwrap_or_else(|| "unknown".into()),
            message: field("error-message").unwrap_or_default(),
        });
    }

    Ok(())
}
