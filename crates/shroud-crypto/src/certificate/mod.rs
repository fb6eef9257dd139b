//! Sender certificates and their signature chain.
//!
//! The certificate format is defined by the delivery server. Both layers of
//! the chain share one envelope shape: CBOR-encoded certificate bytes plus an
//! Ed25519 signature over exactly those bytes.
//!
//! ```text
//! SenderCertificate = { certificate: CBOR(SenderCertificateBody), signature }
//! SenderCertificateBody = { sender_uuid, sender_e164?, sender_device,
//!                           expires_ms, identity_key, signer }
//! signer (ServerCertificate) = { certificate: CBOR({ key_id, key }), signature }
//! ```
//!
//! Parsing only checks structure. Signatures and expiry are checked by
//! [`CertificateValidator`].

mod trust_root;
mod validator;

use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
pub use trust_root::{Deployment, TrustRoot};
pub use validator::CertificateValidator;

use crate::error::CertificateError;

/// Length of an identity key carried in a sender certificate.
pub const IDENTITY_KEY_LEN: usize = 32;

/// Signed wrapper shared by both links of the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SignedEnvelope {
    pub(crate) certificate: Vec<u8>,
    pub(crate) signature: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ServerCertificateBody {
    pub(crate) key_id: u32,
    pub(crate) key: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SenderCertificateBody {
    pub(crate) sender_uuid: String,
    pub(crate) sender_e164: Option<String>,
    pub(crate) sender_device: u32,
    pub(crate) expires_ms: u64,
    pub(crate) identity_key: Vec<u8>,
    pub(crate) signer: SignedEnvelope,
}

/// Intermediate certificate binding a server signing key to a key id.
///
/// Signed by the deployment's [`TrustRoot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCertificate {
    certificate: Vec<u8>,
    signature: Signature,
    key_id: u32,
    key: VerifyingKey,
}

impl ServerCertificate {
    fn from_envelope(envelope: SignedEnvelope) -> Result<Self, CertificateError> {
        let body: ServerCertificateBody = decode(&envelope.certificate, "server certificate")?;
        let signature = parse_signature(&envelope.signature, "server")?;

        let key_bytes: [u8; 32] = body
            .key
            .as_slice()
            .try_into()
            .map_err(|_| CertificateError::malformed("server key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| CertificateError::malformed("server key is not a valid public key"))?;

        Ok(Self { certificate: envelope.certificate, signature, key_id: body.key_id, key })
    }

    /// Key id used for revocation.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Server signing key that signs sender certificates.
    pub fn key(&self) -> &VerifyingKey {
        &self.key
    }

    pub(crate) fn signed_bytes(&self) -> &[u8] {
        &self.certificate
    }

    pub(crate) fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Server-issued credential asserting the local user's identity.
///
/// Held in both forms: the raw serialized bytes (what gets persisted) and the
/// parsed fields (what gets validated and consumed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderCertificate {
    serialized: Vec<u8>,
    certificate: Vec<u8>,
    signature: Signature,
    signer: ServerCertificate,
    sender_uuid: String,
    sender_e164: Option<String>,
    sender_device: u32,
    expires_ms: u64,
    identity_key: [u8; IDENTITY_KEY_LEN],
}

impl SenderCertificate {
    /// Parse a serialized certificate.
    ///
    /// Succeeding here says nothing about trust; run the result through
    /// [`CertificateValidator::validate`] before use.
    ///
    /// # Errors
    ///
    /// - `CertificateError::Malformed` if any layer fails to decode
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CertificateError> {
        let envelope: SignedEnvelope = decode(bytes, "sender certificate envelope")?;
        let body: SenderCertificateBody = decode(&envelope.certificate, "sender certificate")?;
        let signature = parse_signature(&envelope.signature, "sender")?;
        let signer = ServerCertificate::from_envelope(body.signer)?;

        let identity_key = body.identity_key.as_slice().try_into().map_err(|_| {
            CertificateError::malformed(format!("identity key must be {IDENTITY_KEY_LEN} bytes"))
        })?;

        if body.sender_uuid.is_empty() {
            return Err(CertificateError::malformed("sender uuid is empty"));
        }

        Ok(Self {
            serialized: bytes.to_vec(),
            certificate: envelope.certificate,
            signature,
            signer,
            sender_uuid: body.sender_uuid,
            sender_e164: body.sender_e164,
            sender_device: body.sender_device,
            expires_ms: body.expires_ms,
            identity_key,
        })
    }

    /// Raw bytes as received from the server.
    pub fn serialized(&self) -> &[u8] {
        &self.serialized
    }

    /// Account UUID of the sender.
    pub fn sender_uuid(&self) -> &str {
        &self.sender_uuid
    }

    /// Phone number of the sender, if the server included one.
    pub fn sender_e164(&self) -> Option<&str> {
        self.sender_e164.as_deref()
    }

    /// Device id of the sender.
    pub fn sender_device(&self) -> u32 {
        self.sender_device
    }

    /// Expiry in milliseconds since the Unix epoch.
    pub fn expires_ms(&self) -> u64 {
        self.expires_ms
    }

    /// Sender's identity public key.
    pub fn identity_key(&self) -> &[u8; IDENTITY_KEY_LEN] {
        &self.identity_key
    }

    /// Server certificate that signed this certificate.
    pub fn signer(&self) -> &ServerCertificate {
        &self.signer
    }

    pub(crate) fn signed_bytes(&self) -> &[u8] {
        &self.certificate
    }

    pub(crate) fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Decode exactly one CBOR item. Trailing bytes are malformed: no signature
/// covers them.
fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, CertificateError> {
    let mut remaining = bytes;
    let value = ciborium::from_reader(&mut remaining)
        .map_err(|e| CertificateError::malformed(format!("{what} failed to decode: {e}")))?;

    if !remaining.is_empty() {
        return Err(CertificateError::malformed(format!(
            "{what} has {} trailing bytes",
            remaining.len()
        )));
    }

    Ok(value)
}

#[cfg(any(test, feature = "test-utils"))]
pub(crate) fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    let mut bytes = Vec::new();
    let Ok(()) = ciborium::into_writer(value, &mut bytes) else {
        unreachable!("CBOR encoding into a Vec cannot fail for certificate structs");
    };
    bytes
}

fn parse_signature(bytes: &[u8], link: &'static str) -> Result<Signature, CertificateError> {
    Signature::from_slice(bytes)
        .map_err(|_| CertificateError::malformed(format!("{link} signature must be 64 bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CertificateIssuer;

    #[test]
    fn parses_issued_certificate() {
        let issuer = CertificateIssuer::new(1);
        let bytes = issuer.issue("alice-uuid", 2, 1_000);

        let cert = SenderCertificate::deserialize(&bytes).unwrap();

        assert_eq!(cert.sender_uuid(), "alice-uuid");
        assert_eq!(cert.sender_device(), 2);
        assert_eq!(cert.expires_ms(), 1_000);
        assert_eq!(cert.signer().key_id(), issuer.key_id());
        assert_eq!(cert.serialized(), bytes.as_slice());
        assert_eq!(cert.sender_e164(), None);
    }

    #[test]
    fn empty_bytes_are_malformed() {
        let result = SenderCertificate::deserialize(&[]);
        assert!(matches!(result, Err(CertificateError::Malformed { .. })));
    }

    #[test]
    fn garbage_is_malformed() {
        let result = SenderCertificate::deserialize(b"definitely not cbor");
        assert!(matches!(result, Err(CertificateError::Malformed { .. })));
    }

    #[test]
    fn truncated_certificate_is_malformed() {
        let bytes = CertificateIssuer::new(1).issue("alice-uuid", 1, 1_000);
        let result = SenderCertificate::deserialize(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(CertificateError::Malformed { .. })));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let mut bytes = CertificateIssuer::new(1).issue("alice-uuid", 1, 1_000);
        bytes.extend_from_slice(b"TRAILING-JUNK");

        match SenderCertificate::deserialize(&bytes) {
            Err(CertificateError::Malformed { reason }) => {
                assert!(reason.contains("sender certificate envelope"));
                assert!(reason.contains("13 trailing bytes"));
            },
            other => panic!("expected trailing bytes to be rejected, got {other:?}"),
        }
    }

    #[test]
    fn trailing_bytes_inside_signed_body_are_malformed() {
        let bytes = CertificateIssuer::new(1).issue("alice-uuid", 1, 1_000);
        let mut envelope: SignedEnvelope = decode(&bytes, "test").unwrap();
        envelope.certificate.push(0x00);

        match SenderCertificate::deserialize(&encode(&envelope)) {
            Err(CertificateError::Malformed { reason }) => {
                assert!(reason.contains("sender certificate has 1 trailing bytes"));
            },
            other => panic!("expected trailing body bytes to be rejected, got {other:?}"),
        }
    }

    #[test]
    fn short_signature_is_malformed() {
        let issuer = CertificateIssuer::new(1);
        let bytes = issuer.issue("alice-uuid", 1, 1_000);
        let mut envelope: SignedEnvelope = decode(&bytes, "test").unwrap();
        envelope.signature.truncate(10);

        let result = SenderCertificate::deserialize(&encode(&envelope));

        match result {
            Err(CertificateError::Malformed { reason }) => {
                assert!(reason.contains("sender signature"));
            },
            other => panic!("expected malformed signature, got {other:?}"),
        }
    }

    #[test]
    fn wrong_identity_key_length_is_malformed() {
        let issuer = CertificateIssuer::new(1);
        let bytes = issuer.issue("alice-uuid", 1, 1_000);
        let envelope: SignedEnvelope = decode(&bytes, "test").unwrap();
        let mut body: SenderCertificateBody = decode(&envelope.certificate, "test").unwrap();
        body.identity_key = vec![1, 2, 3];

        let reencoded =
            SignedEnvelope { certificate: encode(&body), signature: envelope.signature };
        let result = SenderCertificate::deserialize(&encode(&reencoded));

        match result {
            Err(CertificateError::Malformed { reason }) => assert!(reason.contains("identity key")),
            other => panic!("expected malformed identity key, got {other:?}"),
        }
    }
}
