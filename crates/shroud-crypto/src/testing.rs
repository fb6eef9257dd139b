//! Deterministic certificate issuer for tests.
//!
//! Production code never mints certificates; the server does. Tests need a
//! trust root they control and certificates it signs, so this module plays
//! the server's role with keys derived from a one-byte seed.

use ed25519_dalek::{Signer, SigningKey};

use crate::certificate::{
    SenderCertificateBody, ServerCertificateBody, SignedEnvelope, TrustRoot, encode,
};

/// Test stand-in for the server's certificate authority.
pub struct CertificateIssuer {
    root: SigningKey,
    server: SigningKey,
    key_id: u32,
}

impl CertificateIssuer {
    /// Issuer whose keys are derived from `seed`. Same seed, same keys.
    pub fn new(seed: u8) -> Self {
        Self {
            root: SigningKey::from_bytes(&[seed; 32]),
            server: SigningKey::from_bytes(&[seed ^ 0x5A; 32]),
            key_id: 0x100 + u32::from(seed),
        }
    }

    /// Trust root matching this issuer.
    #[allow(clippy::expect_used)]
    pub fn trust_root(&self) -> TrustRoot {
        TrustRoot::from_bytes(self.root.verifying_key().as_bytes())
            .expect("invariant: a verifying key derived from a signing key is valid")
    }

    /// Key id of the server certificate.
    pub fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Issue a serialized certificate for `sender_uuid` expiring at
    /// `expires_ms`.
    pub fn issue(&self, sender_uuid: &str, sender_device: u32, expires_ms: u64) -> Vec<u8> {
        self.issue_signed_by(&self.server, sender_uuid, sender_device, expires_ms)
    }

    /// Issue a certificate whose sender signature comes from a key other than
    /// the one named in its server certificate.
    pub fn issue_with_mismatched_server_key(
        &self,
        sender_uuid: &str,
        sender_device: u32,
        expires_ms: u64,
    ) -> Vec<u8> {
        let impostor = SigningKey::from_bytes(&[0xEE; 32]);
        self.issue_signed_by(&impostor, sender_uuid, sender_device, expires_ms)
    }

    fn issue_signed_by(
        &self,
        sender_signer: &SigningKey,
        sender_uuid: &str,
        sender_device: u32,
        expires_ms: u64,
    ) -> Vec<u8> {
        let server_body = ServerCertificateBody {
            key_id: self.key_id,
            key: self.server.verifying_key().to_bytes().to_vec(),
        };
        let server_bytes = encode(&server_body);
        let server_signature = self.root.sign(&server_bytes).to_bytes().to_vec();

        let sender_body = SenderCertificateBody {
            sender_uuid: sender_uuid.to_string(),
            sender_e164: None,
            sender_device,
            expires_ms,
            identity_key: vec![0x42; 32],
            signer: SignedEnvelope { certificate: server_bytes, signature: server_signature },
        };
        let sender_bytes = encode(&sender_body);
        let sender_signature = sender_signer.sign(&sender_bytes).to_bytes().to_vec();

        encode(&SignedEnvelope { certificate: sender_bytes, signature: sender_signature })
    }
}
