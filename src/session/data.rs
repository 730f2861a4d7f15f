use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SessionError;

/// Key/value contents of a session.
///
/// The store only ever sees the encoded bytes; JSON is the format chosen by
/// this layer, and an empty payload decodes to an empty map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(BTreeMap<String, Value>);

impl SessionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, SessionError> {
        if payload.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, SessionError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_payload_is_empty_session() {
        let data = SessionData::decode(b"").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn encodes_as_flat_json_object() {
        let mut data = SessionData::new();
        data.insert("user_id", json!(42));
        data.insert("flash", "saved");
        let bytes = data.encode().unwrap();
        assert_eq!(bytes, br#"{"flash":"saved","user_id":42}"#);
        assert_eq!(SessionData::decode(&bytes).unwrap(), data);
    }

    #[test]
    fn garbage_payload_is_codec_error() {
        let err = SessionData::decode(b"\x00not json").unwrap_err();
        assert!(matches!(err, SessionError::Codec(_)));
    }
}
