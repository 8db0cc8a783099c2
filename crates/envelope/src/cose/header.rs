use minicbor::data::Type;
use minicbor::{Decoder, Encoder};

use super::cbor_error;
use crate::algorithm::{Algorithm, PayloadHashAlgorithm};
use crate::error::{Error, Result};

pub const ALG: i64 = 1;
pub const CONTENT_TYPE: i64 = 3;
pub const KID: i64 = 4;
pub const PAYLOAD_HASH_ALG: i64 = 258;
pub const PAYLOAD_PREIMAGE_CONTENT_TYPE: i64 = 259;
pub const PAYLOAD_LOCATION: i64 = 260;

/// The protected header parameters this codec reads and writes.
///
/// Unknown labels are skipped when decoding; the signature still covers
/// them because verification uses the received header bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseProtectedHeader {
    pub alg: Algorithm,
    pub kid: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub payload_hash_alg: Option<PayloadHashAlgorithm>,
    pub preimage_content_type: Option<String>,
    pub payload_location: Option<String>,
}

impl CoseProtectedHeader {
    pub fn new(alg: Algorithm) -> Self {
        Self {
            alg,
            kid: None,
            content_type: None,
            payload_hash_alg: None,
            preimage_content_type: None,
            payload_location: None,
        }
    }

    /// Header for a hash envelope over content stored at `location`.
    pub fn hash_envelope(
        alg: Algorithm,
        hash_alg: PayloadHashAlgorithm,
        preimage_content_type: Option<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            payload_hash_alg: Some(hash_alg),
            preimage_content_type,
            payload_location: Some(location.into()),
            ..Self::new(alg)
        }
    }

    pub fn with_kid(mut self, kid: impl Into<Vec<u8>>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn is_hash_envelope(&self) -> bool {
        self.payload_hash_alg.is_some()
            || self.preimage_content_type.is_some()
            || self.payload_location.is_some()
    }

    /// Serialized map, in ascending label order.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let entries = 1
            + self.kid.is_some() as u64
            + self.content_type.is_some() as u64
            + self.payload_hash_alg.is_some() as u64
            + self.preimage_content_type.is_some() as u64
            + self.payload_location.is_some() as u64;

        let mut out = Vec::new();
        let mut enc = Encoder::new(&mut out);
        enc.map(entries).map_err(cbor_error("protected header"))?;
        enc.i64(ALG)
            .and_then(|e| e.i64(self.alg.cose_id()))
            .map_err(cbor_error("protected header"))?;
        if let Some(content_type) = &self.content_type {
            enc.i64(CONTENT_TYPE)
                .and_then(|e| e.str(content_type))
                .map_err(cbor_error("protected header"))?;
        }
        if let Some(kid) = &self.kid {
            enc.i64(KID)
                .and_then(|e| e.bytes(kid))
                .map_err(cbor_error("protected header"))?;
        }
        if let Some(hash_alg) = &self.payload_hash_alg {
            enc.i64(PAYLOAD_HASH_ALG)
                .and_then(|e| e.i64(hash_alg.cose_id()))
                .map_err(cbor_error("protected header"))?;
        }
        if let Some(content_type) = &self.preimage_content_type {
            enc.i64(PAYLOAD_PREIMAGE_CONTENT_TYPE)
                .and_then(|e| e.str(content_type))
                .map_err(cbor_error("protected header"))?;
        }
        if let Some(location) = &self.payload_location {
            enc.i64(PAYLOAD_LOCATION)
                .and_then(|e| e.str(location))
                .map_err(cbor_error("protected header"))?;
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::malformed("protected header is empty"));
        }

        let mut dec = Decoder::new(bytes);
        let len = dec
            .map()
            .map_err(cbor_error("protected header"))?
            .ok_or_else(|| Error::malformed("indefinite-length protected header"))?;

        // Every entry takes at least one byte for its label and one for its value.
        let remaining = (bytes.len() - dec.position()) as u64;
        if len > remaining / 2 {
            return Err(Error::malformed(format!(
                "protected header claims {len} entries in {remaining} bytes"
            )));
        }

        let mut alg = None;
        let mut header = Self::new(Algorithm::Es256);
        let mut seen = Vec::new();
        let mut seen_text = Vec::new();
        for _ in 0..len {
            if dec.datatype().map_err(cbor_error("protected header"))? == Type::String {
                let label = dec.str().map_err(cbor_error("protected header label"))?;
                if seen_text.contains(&label) {
                    return Err(Error::malformed(format!("duplicate header label {label:?}")));
                }
                seen_text.push(label);
                dec.skip().map_err(cbor_error("protected header"))?;
                continue;
            }

            let label = dec.i64().map_err(cbor_error("protected header label"))?;
            if seen.contains(&label) {
                return Err(Error::malformed(format!("duplicate header label {label}")));
            }
            seen.push(label);

            match label {
                ALG => alg = Some(Algorithm::from_cose_id(read_i64(&mut dec, "alg")?)?),
                CONTENT_TYPE => header.content_type = Some(read_text(&mut dec, "content type")?),
                KID => {
                    let kid = dec.bytes().map_err(cbor_error("kid"))?;
                    header.kid = Some(kid.to_vec());
                }
                PAYLOAD_HASH_ALG => {
                    let id = read_i64(&mut dec, "payload hash alg")?;
                    header.payload_hash_alg = Some(PayloadHashAlgorithm::from_cose_id(id)?);
                }
                PAYLOAD_PREIMAGE_CONTENT_TYPE => {
                    header.preimage_content_type =
                        Some(read_text(&mut dec, "payload preimage content type")?);
                }
                PAYLOAD_LOCATION => {
                    header.payload_location = Some(read_text(&mut dec, "payload location")?);
                }
                _ => dec.skip().map_err(cbor_error("protected header"))?,
            }
        }

        if dec.position() != bytes.len() {
            return Err(Error::malformed("trailing bytes after protected header"));
        }

        header.alg = alg.ok_or_else(|| Error::malformed("protected header has no alg"))?;
        Ok(header)
    }
}

fn read_i64(dec: &mut Decoder<'_>, what: &'static str) -> Result<i64> {
    dec.i64().map_err(cbor_error(what))
}

fn read_text(dec: &mut Decoder<'_>, what: &'static str) -> Result<String> {
    dec.str().map(str::to_string).map_err(cbor_error(what))
}
