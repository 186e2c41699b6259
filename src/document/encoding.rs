//! Text and binary persistence of layers.
//!
//! Text documents are pretty-printed JSON. Binary documents start with the
//! `SMDB` magic and a little-endian format version, followed by the zlib
//! framed compact JSON. Readers detect the encoding from the first bytes.

use serde::{Deserialize, Serialize};

use super::layer::Layer;
use crate::util::compression::{deflate, inflate};
use crate::util::{Error, Result};

/// Magic bytes of a binary document.
pub const BINARY_MAGIC: &[u8; 4] = b"SMDB";
/// Current document format version.
pub const FORMAT_VERSION: u32 = 1;
/// File extension shared by both encodings.
pub const DOCUMENT_EXTENSION: &str = "sdoc";

const FORMAT_TAG: &str = "scene-mirror-document";

/// On-disk encoding of a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Text,
    Binary,
}

impl Encoding {
    pub fn is_binary(self) -> bool {
        matches!(self, Encoding::Binary)
    }
}

#[derive(Serialize)]
struct DocumentOut<'a> {
    format: &'static str,
    version: u32,
    layer: &'a Layer,
}

#[derive(Deserialize)]
struct DocumentIn {
    format: String,
    version: u32,
    layer: Layer,
}

/// Serialize `layer` in the given encoding.
pub fn encode(layer: &Layer, encoding: Encoding) -> Result<Vec<u8>> {
    let doc = DocumentOut {
        format: FORMAT_TAG,
        version: FORMAT_VERSION,
        layer,
    };
    match encoding {
        Encoding::Text => {
            let mut out = serde_json::to_vec_pretty(&doc)?;
            out.push(b'\n');
            Ok(out)
        }
        Encoding::Binary => {
            let json = serde_json::to_vec(&doc)?;
            let packed = deflate(&json, 6)?;
            let mut out = Vec::with_capacity(8 + packed.len());
            out.extend_from_slice(BINARY_MAGIC);
            out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
            out.extend_from_slice(&packed);
            Ok(out)
        }
    }
}

/// Detect the encoding of a persisted document.
pub fn detect(bytes: &[u8]) -> Encoding {
    if bytes.starts_with(BINARY_MAGIC) {
        Encoding::Binary
    } else {
        Encoding::Text
    }
}

/// Decode a document written by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Layer> {
    let json = match detect(bytes) {
        Encoding::Binary => {
            if bytes.len() < 8 {
                return Err(Error::invalid("binary document header truncated"));
            }
            let mut version = [0u8; 4];
            version.copy_from_slice(&bytes[4..8]);
            let version = u32::from_le_bytes(version);
            if version > FORMAT_VERSION {
                return Err(Error::invalid(format!("unsupported document version {}", version)));
            }
            inflate(&bytes[8..])?
        }
        Encoding::Text => bytes.to_vec(),
    };

    let doc: DocumentIn = serde_json::from_slice(&json)?;
    if doc.format != FORMAT_TAG {
        return Err(Error::invalid(format!("unexpected document format '{}'", doc.format)));
    }
    if doc.version > FORMAT_VERSION {
        return Err(Error::invalid(format!("unsupported document version {}", doc.version)));
    }
    Ok(doc.layer)
}

/// Append the document extension to a path stem.
pub fn document_file(stem: &str) -> String {
    format!("{}.{}", stem, DOCUMENT_EXTENSION)
}
