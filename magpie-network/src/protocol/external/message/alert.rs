//! The (deprecated but still consensus-relevant) `alert` message.

use std::io::Read;

use magpie_chain::serialization::sha256d;
use magpie_chain::{SerializationError, WireDeserialize, WireSerialize};

/// An `alert` message: an opaque signed payload.
///
/// The payload is decoded lazily, only after the signature verifies
/// against a trusted alert key, so malformed payload bytes from an
/// untrusted signer never reach the parser.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alert {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Alert {
    /// Check the payload signature against a hex-encoded public key.
    pub fn verify(&self, public_key_hex: &str) -> bool {
        let public_key = match hex::decode(public_key_hex) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let public_key = match secp256k1::PublicKey::from_slice(&public_key) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let signature = match secp256k1::ecdsa::Signature::from_der_lax(&self.signature) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        let digest = sha256d::hash(&self.payload);
        let message = match secp256k1::Message::from_slice(&digest) {
            Ok(message) => message,
            Err(_) => return false,
        };
        let secp = secp256k1::Secp256k1::verification_only();
        let mut signature = signature;
        signature.normalize_s();
        secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
    }

    /// Decode the inner payload. Call only after [`Alert::verify`].
    pub fn decode_payload(&self) -> Result<AlertPayload, SerializationError> {
        AlertPayload::wire_deserialize(&self.payload[..])
    }
}

impl WireSerialize for Alert {
    fn wire_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.payload.wire_serialize(&mut target)?;
        self.signature.wire_serialize(&mut target)
    }
}

impl WireDeserialize for Alert {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Alert {
            payload: <Vec<u8>>::wire_deserialize(&mut reader)?,
            signature: <Vec<u8>>::wire_deserialize(&mut reader)?,
        })
    }
}

/// The decoded alert payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlertPayload {
    pub version: i32,
    pub relay_until: i64,
    pub expiration: i64,
    pub id: i32,
    pub cancel: i32,
    pub set_cancel: Vec<i32>,
    pub min_ver: i32,
    pub max_ver: i32,
    pub set_sub_ver: Vec<String>,
    pub priority: i32,
    pub comment: String,
    pub status_bar: String,
    pub reserved: String,
}

impl WireDeserialize for AlertPayload {
    fn wire_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let version = i32::wire_deserialize(&mut reader)?;
        let relay_until = i64::wire_deserialize(&mut reader)?;
        let expiration = i64::wire_deserialize(&mut reader)?;
        let id = i32::wire_deserialize(&mut reader)?;
        let cancel = i32::wire_deserialize(&mut reader)?;
        let set_cancel = <Vec<i32>>::wire_deserialize(&mut reader)?;
        let min_ver = i32::wire_deserialize(&mut reader)?;
        let max_ver = i32::wire_deserialize(&mut reader)?;
        let set_sub_ver = <Vec<String>>::wire_deserialize(&mut reader)?;
        let priority = i32::wire_deserialize(&mut reader)?;
        let comment = String::wire_deserialize(&mut reader)?;
        let status_bar = String::wire_deserialize(&mut reader)?;
        let reserved = String::wire_deserialize(&mut reader)?;
        Ok(AlertPayload {
            version,
            relay_until,
            expiration,
            id,
            cancel,
            set_cancel,
            min_ver,
            max_ver,
            set_sub_ver,
            priority,
            comment,
            status_bar,
            reserved,
        })
    }
}

impl WireSerialize for AlertPayload {
    fn wire_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.version.wire_serialize(&mut target)?;
        self.relay_until.wire_serialize(&mut target)?;
        self.expiration.wire_serialize(&mut target)?;
        self.id.wire_serialize(&mut target)?;
        self.cancel.wire_serialize(&mut target)?;
        self.set_cancel.wire_serialize(&mut target)?;
        self.min_ver.wire_serialize(&mut target)?;
        self.max_ver.wire_serialize(&mut target)?;
        self.set_sub_ver.wire_serialize(&mut target)?;
        self.priority.wire_serialize(&mut target)?;
        self.comment.wire_serialize(&mut target)?;
        self.status_bar.wire_serialize(&mut target)?;
        self.reserved.wire_serialize(&mut target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip() {
        let payload = AlertPayload {
            version: 1,
            relay_until: 1_400_000_000,
            expiration: 1_400_100_000,
            id: 42,
            cancel: 0,
            set_cancel: vec![40, 41],
            min_ver: 0,
            max_ver: 70002,
            set_sub_ver: vec!["/magpie:0.2.0/".to_owned()],
            priority: 100,
            comment: String::new(),
            status_bar: "upgrade required".to_owned(),
            reserved: String::new(),
        };
        let bytes = payload.wire_serialize_to_vec().unwrap();
        assert_eq!(AlertPayload::wire_deserialize(&bytes[..]).unwrap(), payload);
    }

    #[test]
    fn garbage_signature_fails_verification() {
        let alert = Alert {
            payload: vec![1, 2, 3],
            signature: vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01],
        };
        assert!(!alert.verify(magpie_chain::parameters::VENDOR_ALERT_KEY));
        assert!(!alert.verify("not hex"));
    }
}
