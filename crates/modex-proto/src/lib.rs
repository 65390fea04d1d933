#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Protocol types for the modex native messaging host.
//!
//! This crate defines the request/response types exchanged between the
//! browser extension and the host process.
//!
//! ## Wire format
//! Each direction is an independent stream of frames:
//! - 4-byte little-endian u32 length prefix
//! - UTF-8 JSON payload bytes
//!
//! There is no handshake and no version field; every request frame carries a
//! `type` tag and is answered by exactly one response frame whose `type` is the
//! request tag with [`RESULT_SUFFIX`] appended.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};

/// Suffix appended to a request tag to form its response tag.
pub const RESULT_SUFFIX: &str = "_RESULT";

/// Error text of the default response for unrecognized tags.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Version string meaning "no pin" for package installs.
pub const LATEST_VERSION: &str = "latest";

/// Command tags understood by the host.
pub mod tags {
    pub const CREATE_VENV: &str = "CREATE_VENV";
    pub const LIST_VIRTUAL_ENVS: &str = "LIST_VIRTUAL_ENVS";
    pub const SET_ACTIVE_VIRTUAL_ENV: &str = "SET_ACTIVE_VIRTUAL_ENV";
    pub const INSTALL_PACKAGE: &str = "INSTALL_PACKAGE";
    pub const GET_MODULE_HELP: &str = "GET_MODULE_HELP";
    pub const GET_MODULE_ATTRIBUTES: &str = "GET_MODULE_ATTRIBUTES";
    pub const SEARCH_MODULE_ATTRIBUTES: &str = "SEARCH_MODULE_ATTRIBUTES";

    /// All recognized tags.
    pub const ALL: [&str; 7] = [
        CREATE_VENV,
        LIST_VIRTUAL_ENVS,
        SET_ACTIVE_VIRTUAL_ENV,
        INSTALL_PACKAGE,
        GET_MODULE_HELP,
        GET_MODULE_ATTRIBUTES,
        SEARCH_MODULE_ATTRIBUTES,
    ];
}

/// A request from the extension to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Create a new virtual environment under the host's base directory.
    CreateVenv {
        /// Display name.
        name: String,
        /// Location relative to the base directory.
        path: String,
    },

    /// List all registered environments.
    ListVirtualEnvs,

    /// Mark one environment as the active one.
    SetActiveVirtualEnv {
        /// Environment id.
        id: u64,
    },

    /// Install a package into the active environment.
    InstallPackage {
        /// Distribution name.
        package_name: String,
        /// Exact version, or `"latest"` for no pin.
        #[serde(default = "default_version")]
        version: String,
    },

    /// Fetch documentation text for a module.
    GetModuleHelp {
        /// Importable module name.
        module_name: String,
    },

    /// List a module's public attributes and their runtime types.
    GetModuleAttributes {
        /// Importable module name.
        module_name: String,
    },

    /// List a module's public attributes whose names contain `query`.
    SearchModuleAttributes {
        /// Importable module name.
        module_name: String,
        /// Case-insensitive substring.
        query: String,
    },
}

fn default_version() -> String {
    LATEST_VERSION.to_string()
}

impl Request {
    /// The wire tag of this request.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CreateVenv { .. } => tags::CREATE_VENV,
            Self::ListVirtualEnvs => tags::LIST_VIRTUAL_ENVS,
            Self::SetActiveVirtualEnv { .. } => tags::SET_ACTIVE_VIRTUAL_ENV,
            Self::InstallPackage { .. } => tags::INSTALL_PACKAGE,
            Self::GetModuleHelp { .. } => tags::GET_MODULE_HELP,
            Self::GetModuleAttributes { .. } => tags::GET_MODULE_ATTRIBUTES,
            Self::SearchModuleAttributes { .. } => tags::SEARCH_MODULE_ATTRIBUTES,
        }
    }
}

/// A decoded request frame.
///
/// Tag recognition happens before field decoding so that unknown commands and
/// malformed known commands can both be answered instead of ending the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A recognized, well-formed command.
    Command(Request),
    /// A tag the host does not know.
    Unknown { tag: String },
    /// A recognized tag whose fields failed to decode.
    Malformed { tag: String, reason: String },
}

impl Incoming {
    /// Classify a decoded JSON payload.
    ///
    /// # Errors
    /// Returns `InvalidData` if the payload is not an object with a string `type`.
    pub fn from_value(value: Value) -> io::Result<Self> {
        let tag = match value.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "message has no string `type` field",
                ))
            }
        };

        if !tags::ALL.contains(&tag.as_str()) {
            return Ok(Self::Unknown { tag });
        }

        match serde_json::from_value::<Request>(value) {
            Ok(request) => Ok(Self::Command(request)),
            Err(e) => Ok(Self::Malformed {
                tag,
                reason: e.to_string(),
            }),
        }
    }

    /// The tag the message arrived with.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Command(request) => request.tag(),
            Self::Unknown { tag } | Self::Malformed { tag, .. } => tag,
        }
    }
}

/// Response envelope sent back for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Request tag with [`RESULT_SUFFIX`] appended.
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// The default response, used when the tag is not recognized.
    #[must_use]
    pub fn unknown(tag: &str) -> Self {
        Self::error(tag, UNKNOWN_COMMAND)
    }

    #[must_use]
    pub fn error(tag: &str, message: impl Into<String>) -> Self {
        Self {
            kind: result_tag(tag),
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub fn ok(tag: &str, data: Value) -> Self {
        Self {
            kind: result_tag(tag),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Build a success response from any serializable payload.
    ///
    /// A payload that fails to serialize becomes an error response.
    #[must_use]
    pub fn with_data<T: Serialize>(tag: &str, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::ok(tag, value),
            Err(e) => Self::error(tag, format!("failed to serialize result: {e}")),
        }
    }
}

/// Response tag for a request tag.
#[must_use]
pub fn result_tag(tag: &str) -> String {
    format!("{tag}{RESULT_SUFFIX}")
}

/// One public attribute of an imported module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAttribute {
    pub name: String,
    /// Display name of the attribute's runtime type.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Payload of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// Encode a frame to bytes with length prefix.
///
/// Format: 4-byte little-endian length + JSON bytes
///
/// # Errors
/// Returns an error if serialization fails or the payload exceeds `u32::MAX` bytes.
pub fn encode_frame<T: Serialize>(frame: &T) -> io::Result<Vec<u8>> {
    let json =
        serde_json::to_vec(frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let len = u32::try_from(json.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame too large"))?;

    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&json);

    Ok(buf)
}

/// Decode a frame from bytes (without length prefix).
///
/// # Errors
/// Returns an error if the bytes are not UTF-8 JSON of the expected shape.
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> io::Result<T> {
    serde_json::from_slice(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a length-prefixed frame to a writer.
///
/// # Errors
/// Returns an error if encoding or writing fails.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, frame: &T) -> io::Result<()> {
    let encoded = encode_frame(frame)?;
    writer.write_all(&encoded)?;
    writer.flush()
}

/// Read a length-prefixed frame from a reader.
///
/// Returns `Ok(None)` when the stream ends cleanly at a frame boundary.
///
/// # Errors
/// Returns `UnexpectedEof` if the stream ends inside a frame and `InvalidData`
/// if the payload cannot be decoded.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated length prefix: {filled} of 4 bytes"),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    decode_frame(&buf).map(Some)
}
