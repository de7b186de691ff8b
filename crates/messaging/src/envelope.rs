//! Text envelope encoding/decoding.
//!
//! Bodies are JSON. Some upstream producers emit near-JSON with unquoted object keys
//! (`{id: "1"}`); when strict parsing fails, [`decode`] retries once after
//! [`repair_bare_keys`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::queue::TransportError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("undecodable message body {body:?}: {reason}")]
pub struct DecodeError {
    pub body: String,
    pub reason: String,
}

pub fn encode<P: Serialize + ?Sized>(payload: &P) -> Result<String, TransportError> {
    serde_json::to_string(payload).map_err(|e| TransportError::Serialization(e.to_string()))
}

/// Strict parse first, then one attempt on the key-repaired body.
pub fn decode<M: DeserializeOwned>(body: &str) -> Result<M, DecodeError> {
    let strict = match serde_json::from_str(body) {
        Ok(message) => return Ok(message),
        Err(e) => e,
    };

    let repaired = repair_bare_keys(body);
    if repaired == body {
        return Err(DecodeError {
            body: body.to_string(),
            reason: strict.to_string(),
        });
    }

    serde_json::from_str(&repaired).map_err(|e| DecodeError {
        body: body.to_string(),
        reason: format!("{strict}; after key repair: {e}"),
    })
}

/// Quote bare identifiers that sit in object-key position.
///
/// String literals are copied untouched, so a `word:` inside a value survives.
pub fn repair_bare_keys(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len() + 8);
    let mut in_string = false;
    let mut escaped = false;
    let mut key_position = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if key_position && is_key_char(c) {
            let start = i;
            while i < chars.len() && is_key_char(chars[i]) {
                i += 1;
            }
            let key: String = chars[start..i].iter().collect();

            let mut lookahead = i;
            while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                lookahead += 1;
            }

            if chars.get(lookahead) == Some(&':') {
                out.push('"');
                out.push_str(&key);
                out.push('"');
            } else {
                out.push_str(&key);
            }
            key_position = false;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                key_position = false;
            }
            '{' | ',' => key_position = true,
            c if c.is_whitespace() => {}
            _ => key_position = false,
        }
        out.push(c);
        i += 1;
    }

    out
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
