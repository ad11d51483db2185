use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mal_types::{Digest, Label};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AnchorError, AnchorResult};

/// How a ledger returns the anchored bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// `data_bytes` holds base64.
    #[default]
    Base64Bytes,
    /// `json_metadata` is a hex string.
    HexString,
    /// `json_metadata.data` is an array of byte values.
    ByteArray,
}

/// One metadata entry of an anchoring transaction, as a ledger reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bytes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_metadata: Option<Value>,
}

impl MetadataEntry {
    /// Build the entry that anchors `root` under `label`.
    pub fn encode(label: Label, root: &Digest, encoding: PayloadEncoding) -> Self {
        let bytes = root.as_bytes();
        let (data_bytes, json_metadata) = match encoding {
            PayloadEncoding::Base64Bytes => (Some(STANDARD.encode(bytes)), None),
            PayloadEncoding::HexString => (None, Some(Value::String(hex::encode(bytes)))),
            PayloadEncoding::ByteArray => {
                let data = bytes.iter().map(|&b| Value::from(b)).collect();
                let mut object = serde_json::Map::new();
                object.insert("data".into(), Value::Array(data));
                (None, Some(Value::Object(object)))
            }
        };
        Self {
            label: label.to_string(),
            data_bytes,
            json_metadata,
        }
    }

    /// Whether this entry sits under `label`.
    pub fn has_label(&self, label: Label) -> bool {
        self.label.trim().parse::<Label>().is_ok_and(|l| l == label)
    }

    /// Recover the anchored root.
    ///
    /// `data_bytes` wins when present; otherwise `json_metadata` may be a hex
    /// string or an object whose `data` field is a byte array. Anything that
    /// does not yield exactly 32 bytes is `Malformed`.
    pub fn decode_root(&self) -> AnchorResult<Digest> {
        let bytes = match (&self.data_bytes, &self.json_metadata) {
            (Some(encoded), _) => STANDARD
                .decode(encoded.trim())
                .map_err(|e| AnchorError::Malformed(format!("data_bytes is not base64: {e}")))?,
            (None, Some(Value::String(s))) => {
                let s = s.trim();
                hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| {
                    AnchorError::Malformed(format!("json_metadata is not hex: {e}"))
                })?
            }
            (None, Some(Value::Object(object))) => match object.get("data") {
                Some(Value::Array(items)) => byte_array(items)?,
                _ => {
                    return Err(AnchorError::Malformed(
                        "json_metadata carries no data array".into(),
                    ))
                }
            },
            (None, Some(other)) => {
                return Err(AnchorError::Malformed(format!(
                    "unexpected json_metadata shape: {other}"
                )))
            }
            (None, None) => {
                return Err(AnchorError::Malformed(format!(
                    "metadata entry {} has no payload",
                    self.label
                )))
            }
        };
        Digest::from_slice(&bytes).map_err(|e| AnchorError::Malformed(e.to_string()))
    }
}

fn byte_array(items: &[Value]) -> AnchorResult<Vec<u8>> {
    items
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| AnchorError::Malformed(format!("not a byte value: {v}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Digest {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8 * 7;
        }
        Digest::from_hash(bytes)
    }

    #[test]
    fn every_encoding_yields_same_root() {
        for encoding in [
            PayloadEncoding::Base64Bytes,
            PayloadEncoding::HexString,
            PayloadEncoding::ByteArray,
        ] {
            let entry = MetadataEntry::encode(3, &root(), encoding);
            assert_eq!(entry.decode_root().unwrap(), root(), "{encoding:?}");
            assert!(entry.has_label(3));
        }
    }

    #[test]
    fn decodes_ledger_json_shapes() {
        let hex_root = root().to_hex();
        let as_string: MetadataEntry =
            serde_json::from_value(serde_json::json!({ "label": "9", "json_metadata": hex_root }))
                .unwrap();
        assert_eq!(as_string.decode_root().unwrap(), root());

        let array: Vec<u8> = root().as_bytes().to_vec();
        let as_array: MetadataEntry = serde_json::from_value(serde_json::json!({
            "label": "9",
            "json_metadata": { "data": array }
        }))
        .unwrap();
        assert_eq!(as_array.decode_root().unwrap(), root());
    }

    #[test]
    fn base64_takes_precedence() {
        let mut entry = MetadataEntry::encode(1, &root(), PayloadEncoding::Base64Bytes);
        entry.json_metadata = Some(Value::String("00".into()));
        assert_eq!(entry.decode_root().unwrap(), root());
    }

    #[test]
    fn wrong_length_is_malformed() {
        let entry = MetadataEntry {
            label: "1".into(),
            data_bytes: Some(STANDARD.encode([1u8; 31])),
            json_metadata: None,
        };
        assert!(matches!(entry.decode_root(), Err(AnchorError::Malformed(_))));
    }

    #[test]
    fn out_of_range_byte_is_malformed() {
        let entry = MetadataEntry {
            label: "1".into(),
            data_bytes: None,
            json_metadata: Some(serde_json::json!({ "data": [256] })),
        };
        assert!(matches!(entry.decode_root(), Err(AnchorError::Malformed(_))));
    }

    #[test]
    fn empty_entry_is_malformed() {
        let entry = MetadataEntry {
            label: "1".into(),
            data_bytes: None,
            json_metadata: None,
        };
        assert!(entry.decode_root().is_err());
        assert!(!entry.has_label(2));
    }
}
