//! # Envelope
//!
//! Assembles an outbound message into the wire format the server relays
//! between workspaces.
//!
//! Wire format (plain `\n`-joined, not CRLF — the envelope framing is not
//! subject to the keycard module's byte-exact signing requirement):
//!
//! ```text
//! MENSAGO
//! {"Version":"1.0","Date":"...","KeyHash":"...","PayloadKey":"...", ...}
//! ----------
//! XSALSA20
//! <base85 ciphertext>
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::address::WAddress;
use crate::crypto::hashing::hash_default;
use crate::crypto::keys::SecretKey;
use crate::crypto::sealed;
use crate::crypto::CryptoString;
use crate::error::{MensagoError, Result};
use crate::time;

const VERSION: &str = "1.0";
const SEPARATOR: &str = "----------";

/// The generic JSON container every Mensago data file (messages,
/// contact-request payloads) shares: `Version`, `Date`, `KeyHash`,
/// `PayloadKey`, and the optional routing tags `Sender`/`Receiver`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFileFields {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "KeyHash")]
    pub key_hash: String,
    #[serde(rename = "PayloadKey")]
    pub payload_key: String,
    #[serde(rename = "Sender", skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(rename = "Receiver", skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

/// A single image or file attachment embedded in a [`UserMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub mime_type: String,
    #[serde(rename = "Data")]
    pub data: String,
}

/// The decrypted payload of a user-to-user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    #[serde(rename = "Type")]
    pub msg_type: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "ThreadID")]
    pub thread_id: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Body")]
    pub body: String,
    #[serde(rename = "Images", skip_serializing_if = "Vec::is_empty", default)]
    pub images: Vec<Attachment>,
    #[serde(rename = "Attachments", skip_serializing_if = "Vec::is_empty", default)]
    pub attachments: Vec<Attachment>,
}

/// The message container: envelope metadata plus a message-specific
/// symmetric key, sealed to the recipient, guarding the encrypted payload.
pub struct Envelope {
    fields: HashMap<String, String>,
    payload: Option<Vec<u8>>,
    msgkey: Option<SecretKey>,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope {
    pub fn new() -> Self {
        let mut fields = HashMap::new();
        fields.insert("Version".to_string(), VERSION.to_string());
        fields.insert("Date".to_string(), time::now_timestamp());
        fields.insert("KeyHash".to_string(), String::new());
        fields.insert("PayloadKey".to_string(), String::new());
        Self {
            fields,
            payload: None,
            msgkey: None,
        }
    }

    /// Sets the plaintext payload (a [`UserMessage`] or any other
    /// serializable data-file body) that [`Envelope::marshall`] will
    /// encrypt.
    pub fn set_payload<T: Serialize>(&mut self, payload: &T) -> Result<()> {
        self.payload = Some(serde_json::to_vec(payload)?);
        Ok(())
    }

    /// Generates a fresh message-specific symmetric key and attaches it in
    /// sealed form: `PayloadKey` holds the key sealed to `recipient_key`,
    /// `KeyHash` holds a fingerprint of `recipient_key` itself.
    pub fn set_msg_key(&mut self, recipient_key: &CryptoString) -> Result<()> {
        if !recipient_key.is_valid() {
            return Err(MensagoError::BadParameterValue("recipient key".into()));
        }

        let msgkey = SecretKey::generate();
        let sealed_key = sealed::seal(&msgkey.key_string()?.as_bytes(), recipient_key)?;

        self.fields
            .insert("PayloadKey".to_string(), sealed_key.as_string());
        self.fields.insert(
            "KeyHash".to_string(),
            hash_default(&recipient_key.raw_data()?)?.as_string(),
        );
        self.msgkey = Some(msgkey);
        Ok(())
    }

    /// Encrypted sender tag: `{"From": sender, "RecipientDomain": ...}`
    /// sealed to `orgkey` — the *sender's* organization key, so the
    /// sender's own server can route the message on egress.
    pub fn set_sender(&mut self, sender: &WAddress, recipient: &WAddress, orgkey: &CryptoString) -> Result<()> {
        if !sender.is_valid() || !recipient.is_valid() || !orgkey.is_valid() {
            return Err(MensagoError::BadParameterValue("bad sender/recipient/org key".into()));
        }
        let tag = serde_json::json!({
            "From": sender.as_string(),
            "RecipientDomain": recipient.domain().as_string(),
        });
        let sealed_tag = sealed::seal(&serde_json::to_vec(&tag)?, orgkey)?;
        self.fields.insert("Sender".to_string(), sealed_tag.as_string());
        Ok(())
    }

    /// Encrypted receiver tag: `{"To": recipient, "SenderDomain": ...}`
    /// sealed to `orgkey` — the *recipient's* organization key.
    pub fn set_receiver(&mut self, sender: &WAddress, recipient: &WAddress, orgkey: &CryptoString) -> Result<()> {
        if !sender.is_valid() || !recipient.is_valid() || !orgkey.is_valid() {
            return Err(MensagoError::BadParameterValue("bad sender/recipient/org key".into()));
        }
        let tag = serde_json::json!({
            "To": recipient.as_string(),
            "SenderDomain": sender.domain().as_string(),
        });
        let sealed_tag = sealed::seal(&serde_json::to_vec(&tag)?, orgkey)?;
        self.fields.insert("Receiver".to_string(), sealed_tag.as_string());
        Ok(())
    }

    /// Flattens the envelope into its wire format. Requires the message
    /// key, `KeyHash`, and `PayloadKey` to be set (via
    /// [`Envelope::set_msg_key`]), a payload (via
    /// [`Envelope::set_payload`]), and both `Sender` and `Receiver` tags.
    pub fn marshall(&self) -> Result<String> {
        let msgkey = self
            .msgkey
            .as_ref()
            .ok_or_else(|| MensagoError::RequiredFieldMissing("message key missing".into()))?;

        let key_hash = CryptoString::parse(&self.fields["KeyHash"])
            .map_err(|_| MensagoError::Internal("bad msg key hash".into()))?;
        if !key_hash.is_valid() {
            return Err(MensagoError::Internal("bad msg key hash".into()));
        }

        let payload_key = CryptoString::parse(&self.fields["PayloadKey"])
            .map_err(|_| MensagoError::Internal("bad payload key".into()))?;
        if !payload_key.is_valid() {
            return Err(MensagoError::Internal("bad payload key".into()));
        }

        if self.fields.get("Version").map(String::as_str) != Some(VERSION) {
            return Err(MensagoError::BadData("bad version value".into()));
        }

        if self.fields.get("Sender").filter(|s| !s.is_empty()).is_none() {
            return Err(MensagoError::RequiredFieldMissing("Sender".into()));
        }
        if self.fields.get("Receiver").filter(|s| !s.is_empty()).is_none() {
            return Err(MensagoError::RequiredFieldMissing("Receiver".into()));
        }

        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| MensagoError::RequiredFieldMissing("payload missing".into()))?;

        let data_file = DataFileFields {
            version: self.fields["Version"].clone(),
            date: self.fields["Date"].clone(),
            key_hash: self.fields["KeyHash"].clone(),
            payload_key: self.fields["PayloadKey"].clone(),
            sender: self.fields.get("Sender").cloned(),
            receiver: self.fields.get("Receiver").cloned(),
        };
        let envstr = serde_json::to_string(&data_file)?;

        let ciphertext = crate::crypto::secretbox::encrypt(payload, msgkey)?;
        let data = base85::encode(&ciphertext);
        let key_prefix = msgkey.key_string()?.prefix().to_string();

        Ok([
            "MENSAGO".to_string(),
            envstr,
            SEPARATOR.to_string(),
            key_prefix,
            data,
        ]
        .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Domain, UUID};
    use crate::crypto::keys::EncryptionPair;

    fn waddr(domain: &str) -> WAddress {
        let mut w = WAddress::new();
        let id = UUID::generate();
        w.set(&format!("{}/{domain}", id.as_string())).unwrap();
        w
    }

    #[test]
    fn marshall_fails_without_msg_key() {
        let env = Envelope::new();
        assert!(env.marshall().is_err());
    }

    #[test]
    fn full_round_trip_marshalls() {
        let recipient_keys = EncryptionPair::generate();
        let org_keys = EncryptionPair::generate();

        let sender = waddr("sender.example.com");
        let recipient = waddr("recipient.example.com");

        let mut env = Envelope::new();
        env.set_msg_key(&recipient_keys.public_string().unwrap()).unwrap();
        env.set_sender(&sender, &recipient, &org_keys.public_string().unwrap())
            .unwrap();
        env.set_receiver(&sender, &recipient, &org_keys.public_string().unwrap())
            .unwrap();

        let message = UserMessage {
            msg_type: "usermessage".into(),
            version: "1.0".into(),
            from: sender.as_string(),
            to: recipient.as_string(),
            date: time::now_timestamp(),
            thread_id: UUID::generate().as_string(),
            subject: "Hello".into(),
            body: "Hi there".into(),
            images: Vec::new(),
            attachments: Vec::new(),
        };
        env.set_payload(&message).unwrap();

        let marshalled = env.marshall().unwrap();
        let lines: Vec<&str> = marshalled.split('\n').collect();
        assert_eq!(lines[0], "MENSAGO");
        assert_eq!(lines[2], "----------");
        assert_eq!(lines[3], "XSALSA20");
    }

    #[test]
    fn marshall_fails_without_sender_or_receiver() {
        let recipient_keys = EncryptionPair::generate();
        let mut env = Envelope::new();
        env.set_msg_key(&recipient_keys.public_string().unwrap()).unwrap();
        env.set_payload(&serde_json::json!({"Body": "hi"})).unwrap();
        assert!(env.marshall().is_err());
    }
}
