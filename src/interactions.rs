//! Interaction webhook payloads and request signing.
//!
//! The platform delivers slash commands as signed HTTP POSTs. Each request
//! carries an Ed25519 signature over `timestamp || body`, checked against
//! the application's public key before the payload is even parsed.

use crate::commands::{CommandReply, Invocation, Registry};
use crate::warden::Warden;
use ring::signature::{ED25519, UnparsedPublicKey};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use thiserror::Error;

const PING: u8 = 1;
const APPLICATION_COMMAND: u8 = 2;

const RESPONSE_PONG: u8 = 1;
const RESPONSE_MESSAGE: u8 = 4;

/// Message flag: only the invoker sees the reply.
const FLAG_EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("public key is not hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("public key must be 32 bytes, got {0}")]
    Length(usize),
}

/// Checks interaction request signatures.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    public_key: Vec<u8>,
}

impl SignatureVerifier {
    pub fn from_hex(key: &str) -> Result<Self, KeyError> {
        let public_key = hex::decode(key.trim())?;
        if public_key.len() != 32 {
            return Err(KeyError::Length(public_key.len()));
        }
        Ok(Self { public_key })
    }

    /// Whether `signature_hex` signs `timestamp || body`.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
        let Ok(signature) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);
        UnparsedPublicKey::new(&ED25519, &self.public_key)
            .verify(&message, &signature)
            .is_ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: Option<CommandData>,
    /// Present for guild interactions only.
    #[serde(default)]
    pub member: Option<Member>,
}

#[derive(Debug, Deserialize)]
pub struct CommandData {
    pub name: String,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

#[derive(Debug, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
}

fn option_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Invocation {
    fn from_interaction(member: &Member, data: &CommandData) -> Self {
        let options: HashMap<String, String> = data
            .options
            .iter()
            .map(|o| (o.name.clone(), option_text(&o.value)))
            .collect();
        Self {
            invoker_id: member.user.id.clone(),
            invoker_role_ids: member.roles.clone(),
            options,
        }
    }
}

fn message_response(reply: &CommandReply) -> Value {
    let mut data = json!({
        "content": reply.content,
        "allowed_mentions": { "parse": [] },
    });
    if reply.ephemeral {
        data["flags"] = json!(FLAG_EPHEMERAL);
    }
    json!({ "type": RESPONSE_MESSAGE, "data": data })
}

/// Build the response body for a verified interaction.
pub async fn respond(warden: &Warden, registry: &Registry, interaction: &Interaction) -> Value {
    match interaction.kind {
        PING => json!({ "type": RESPONSE_PONG }),
        APPLICATION_COMMAND => {
            let reply = match (&interaction.member, &interaction.data) {
                (Some(member), Some(data)) => {
                    let inv = Invocation::from_interaction(member, data);
                    registry.dispatch(warden, &data.name, &inv).await
                }
                (None, _) => CommandReply::private("Commands can only be used in a server."),
                (_, None) => CommandReply::private("Unknown command"),
            };
            message_response(&reply)
        }
        _ => message_response(&CommandReply::private("Unsupported interaction")),
    }
}
