//! Patch wire type
//!
//! Provides [`Patch`], the (format, payload) pair an extension returns for
//! one subject resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

/// Patch format
///
/// Unrecognized strings are kept as [`PatchType::Unknown`] so the engine can
/// reject them with the offending value instead of failing to decode the
/// whole response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatchType {
    /// RFC 6902 operation list
    JsonPatch,
    /// RFC 7386 overlay
    JsonMergePatch,
    /// Anything else an extension sent
    Unknown(String),
}

impl PatchType {
    /// Wire name
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::JsonPatch => "JSONPatch",
            Self::JsonMergePatch => "JSONMergePatch",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for PatchType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "JSONPatch" => Self::JsonPatch,
            "JSONMergePatch" => Self::JsonMergePatch,
            _ => Self::Unknown(value),
        }
    }
}

impl From<PatchType> for String {
    fn from(value: PatchType) -> Self {
        match value {
            PatchType::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl Display for PatchType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One patch proposed by an extension
///
/// The payload travels base64 encoded on the wire, like any byte field of
/// the extension protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    /// Patch format; `None` is rejected by the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    /// Raw patch document
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub patch: Vec<u8>,
}

impl Patch {
    /// Create patch from raw parts
    #[inline]
    #[must_use]
    pub fn new(patch_type: PatchType, patch: impl Into<Vec<u8>>) -> Self {
        Self {
            patch_type: Some(patch_type),
            patch: patch.into(),
        }
    }

    /// RFC 6902 patch from a JSON operation list
    #[must_use]
    pub fn json_patch(operations: &Value) -> Self {
        Self::new(PatchType::JsonPatch, operations.to_string())
    }

    /// RFC 7386 patch from a JSON overlay
    #[must_use]
    pub fn merge_patch(overlay: &Value) -> Self {
        Self::new(PatchType::JsonMergePatch, overlay.to_string())
    }

    /// A patch is defined if it names a type or carries a payload
    #[inline]
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.patch_type.is_some() || !self.patch.is_empty()
    }

    /// Payload as text for logs and error context
    #[inline]
    #[must_use]
    pub fn payload(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.patch)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
