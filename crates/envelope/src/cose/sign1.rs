use minicbor::data::{Tag, Type};
use minicbor::{Decoder, Encoder};

use super::cbor_error;
use super::header::CoseProtectedHeader;
use crate::error::{Error, Result};

pub const COSE_SIGN1_TAG: u64 = 18;
pub const SIG_STRUCTURE_CONTEXT_SIGNATURE1: &str = "Signature1";

/// A single-signer COSE message with an embedded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseSign1 {
    /// Protected header bytes exactly as signed.
    pub protected: Vec<u8>,
    pub header: CoseProtectedHeader,
    /// The content, or its digest for hash envelopes.
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    pub fn sig_structure(&self) -> Result<Vec<u8>> {
        encode_signature1_sig_structure(&self.protected, &self.payload)
    }

    /// Tagged `[protected, {}, payload, signature]`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.protected.len() + self.payload.len() + self.signature.len());
        {
            let mut enc = Encoder::new(&mut out);
            enc.tag(Tag::new(COSE_SIGN1_TAG)).map_err(cbor_error("COSE_Sign1"))?;
            enc.array(4).map_err(cbor_error("COSE_Sign1"))?;
            enc.bytes(&self.protected).map_err(cbor_error("COSE_Sign1"))?;
            enc.map(0).map_err(cbor_error("COSE_Sign1"))?;
            enc.bytes(&self.payload).map_err(cbor_error("COSE_Sign1"))?;
            enc.bytes(&self.signature).map_err(cbor_error("COSE_Sign1"))?;
        }
        Ok(out)
    }

    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        if input.is_empty() {
            return Err(Error::malformed("empty COSE_Sign1"));
        }

        let mut dec = Decoder::new(input);

        // Optional COSE_Sign1 tag (18)
        if dec.datatype().map_err(cbor_error("COSE_Sign1"))? == Type::Tag {
            let tag = dec.tag().map_err(cbor_error("COSE_Sign1 tag"))?;
            if tag != Tag::new(COSE_SIGN1_TAG) {
                return Err(Error::malformed("unexpected CBOR tag, expected COSE_Sign1 (18)"));
            }
        }

        let len = dec
            .array()
            .map_err(cbor_error("COSE_Sign1"))?
            .ok_or_else(|| Error::malformed("indefinite-length COSE_Sign1"))?;
        if len != 4 {
            return Err(Error::malformed(format!("COSE_Sign1 has {len} elements, expected 4")));
        }

        let protected = dec.bytes().map_err(cbor_error("protected header"))?.to_vec();
        let header = CoseProtectedHeader::decode(&protected)?;

        if dec.datatype().map_err(cbor_error("unprotected header"))? != Type::Map {
            return Err(Error::malformed("unprotected header is not a map"));
        }
        dec.skip().map_err(cbor_error("unprotected header"))?;

        let payload = match dec.datatype().map_err(cbor_error("payload"))? {
            Type::Bytes => dec.bytes().map_err(cbor_error("payload"))?.to_vec(),
            Type::Null => return Err(Error::malformed("detached COSE payloads are not supported")),
            other => return Err(Error::malformed(format!("payload is {other:?}, expected bstr"))),
        };

        let signature = dec.bytes().map_err(cbor_error("signature"))?.to_vec();

        if dec.position() != input.len() {
            return Err(Error::malformed("trailing bytes after COSE_Sign1"));
        }

        Ok(Self {
            protected,
            header,
            payload,
            signature,
        })
    }
}

/// `["Signature1", protected, h'', payload]`
pub fn encode_signature1_sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(32 + protected.len() + payload.len());
    {
        let mut enc = Encoder::new(&mut out);
        enc.array(4).map_err(cbor_error("Sig_structure"))?;
        enc.str(SIG_STRUCTURE_CONTEXT_SIGNATURE1).map_err(cbor_error("Sig_structure"))?;
        enc.bytes(protected).map_err(cbor_error("Sig_structure"))?;
        enc.bytes(&[]).map_err(cbor_error("Sig_structure"))?; // external_aad
        enc.bytes(payload).map_err(cbor_error("Sig_structure"))?;
    }
    Ok(out)
}
