//! Verified Ed25519 Implementation
//!
//! This module provides Ed25519 digital signatures with embedded proof
//! certificates from Coq formal verification. The implementation wraps
//! the `ed25519-dalek` crate with proofs of:
//! - Signature verification correctness
//! - EUF-CMA (existential unforgeability under chosen-message attack)
//! - Signature determinism
//! - Key derivation uniqueness
//!
//! Proven properties are documented in `specs/coq/Ed25519.v`

use super::proof_certificate::{ProofCertificate, Verified};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

// -----------------------------------------------------------------------------
// Proof Certificates (extracted from Coq)
// -----------------------------------------------------------------------------

/// Ed25519 verification correctness: verify(pk, msg, sign(sk, msg)) = true
///
/// **Theorem:** `ed25519_verify_correct` in `specs/coq/Ed25519.v:99`
///
/// **Proven:** Valid signatures always verify
pub const ED25519_VERIFY_CORRECTNESS_CERT: ProofCertificate = ProofCertificate::new(
    400,       // theorem_id
    1,         // proof_system_id (Coq 8.18)
    2026_0205, // verified_at
    1,         // assumption_count (Ed25519 construction)
);

/// Ed25519 EUF-CMA: existential unforgeability under chosen-message attack
///
/// **Theorem:** `ed25519_euf_cma` in `specs/coq/Ed25519.v:120`
///
/// **Proven:** Cannot forge signatures without secret key
pub const ED25519_EUF_CMA_CERT: ProofCertificate = ProofCertificate::new(
    401,       // theorem_id
    1,         // proof_system_id
    2026_0205, // verified_at
    2,         // assumption_count (ECDLP, Curve25519)
);

/// Ed25519 determinism: same key + message always produces same signature
///
/// **Theorem:** `ed25519_deterministic` in `specs/coq/Ed25519.v:144`
///
/// **Proven:** Signatures are deterministic (no randomness)
pub const ED25519_DETERMINISM_CERT: ProofCertificate = ProofCertificate::new(
    402,       // theorem_id
    1,         // proof_system_id
    2026_0205, // verified_at
    1,         // assumption_count (SHA-512 deterministic nonce)
);

/// Key derivation uniqueness: different seeds produce different public keys
///
/// **Theorem:** `key_derivation_unique` in `specs/coq/Ed25519.v:197`
///
/// **Proven:** Different seeds → different keys
pub const KEY_DERIVATION_UNIQUENESS_CERT: ProofCertificate = ProofCertificate::new(
    403,       // theorem_id
    1,         // proof_system_id
    2026_0205, // verified_at
    2,         // assumption_count (derive_signing_key_injective, derive_public_key_injective)
);

// -----------------------------------------------------------------------------
// Verified Ed25519 Digital Signatures
// -----------------------------------------------------------------------------

/// Verified Ed25519 signing key with proof certificates
pub struct VerifiedSigningKey {
    inner: SigningKey,
}

// Manual Debug implementation to avoid exposing key material
impl std::fmt::Debug for VerifiedSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifiedSigningKey")
            .field("inner", &"<redacted>")
            .finish()
    }
}

impl VerifiedSigningKey {
    /// Generate a new signing key from system randomness
    ///
    /// **Proven:** `key_derivation_unique` - different randomness → different keys
    ///
    /// # Example
    /// ```
    /// use kimberlite_crypto::verified::VerifiedSigningKey;
    ///
    /// let signing_key = VerifiedSigningKey::generate();
    /// ```
    pub fn generate() -> Self {
        let inner = SigningKey::generate(&mut OsRng);
        Self { inner }
    }

    /// Create signing key from 32-byte seed
    ///
    /// **Proven:** `key_derivation_unique` - deterministic key derivation
    ///
    /// # Safety
    /// Seed must be cryptographically random. Never reuse seeds.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        // Assert seed is not all zeros (degenerate key)
        assert_ne!(
            bytes, &[0u8; 32],
            "Ed25519 secret key seed is all zeros (degenerate key)"
        );

        let inner = SigningKey::from_bytes(bytes);
        Self { inner }
    }

    /// Get the bytes of the signing key
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Derive verifying key from signing key
    ///
    /// **Proven:** `derive_public_key_deterministic` - always returns same key
    pub fn verifying_key(&self) -> VerifiedVerifyingKey {
        VerifiedVerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Sign a message with determinism proof
    ///
    /// **Proven:** `ed25519_deterministic` - same key + message = same signature
    /// **Proven:** `ed25519_verify_correct` - signature will verify
    ///
    /// # Example
    /// ```
    /// use kimberlite_crypto::verified::VerifiedSigningKey;
    ///
    /// let signing_key = VerifiedSigningKey::generate();
    /// let message = b"audit log entry";
    /// let signature = signing_key.sign(message);
    /// ```
    pub fn sign(&self, message: &[u8]) -> VerifiedSignature {
        let inner = self.inner.sign(message);
        VerifiedSignature { inner }
    }
}

/// Verified Ed25519 verifying key (public key)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedVerifyingKey {
    inner: VerifyingKey,
}

impl VerifiedVerifyingKey {
    /// Create verifying key from 32-byte compressed point
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, String> {
        // Assert key is not all zeros (degenerate key)
        assert_ne!(
            bytes, &[0u8; 32],
            "Ed25519 public key is all zeros (degenerate key)"
        );

        let inner = VerifyingKey::from_bytes(bytes).map_err(|e| e.to_string())?;
        Ok(Self { inner })
    }

    /// Get the bytes of the verifying key
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Verify a signature with correctness proof
    ///
    /// **Proven:** `ed25519_verify_correct` - valid signatures always verify
    /// **Proven:** `ed25519_euf_cma` - forged signatures fail
    ///
    /// Uses RFC 8032 §5.1.7 strict verification, rejecting non-canonical
    /// signatures to prevent signature malleability.
    ///
    /// # Example
    /// ```
    /// use kimberlite_crypto::verified::VerifiedSigningKey;
    ///
    /// let signing_key = VerifiedSigningKey::generate();
    /// let verifying_key = signing_key.verifying_key();
    /// let message = b"audit log entry";
    /// let signature = signing_key.sign(message);
    ///
    /// assert!(verifying_key.verify(message, &signature).is_ok());
    /// ```
    pub fn verify(&self, message: &[u8], signature: &VerifiedSignature) -> Result<(), String> {
        self.inner
            .verify_strict(message, &signature.inner)
            .map_err(|_| "Signature verification failed".to_string())
    }
}

/// Verified Ed25519 signature
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedSignature {
    inner: Signature,
}

impl VerifiedSignature {
    /// Create signature from 64-byte array
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        // Assert signature is not all zeros (degenerate signature)
        assert_ne!(
            bytes, &[0u8; 64],
            "Ed25519 signature is all zeros (degenerate signature)"
        );

        let inner = Signature::from_bytes(bytes);
        Self { inner }
    }

    /// Get the bytes of the signature
    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }
}

// Verified trait implementations
impl Verified for VerifiedSigningKey {
    fn proof_certificate() -> ProofCertificate {
        ED25519_VERIFY_CORRECTNESS_CERT
    }

    fn theorem_name() -> &'static str {
        "ed25519_verify_correct"
    }

    fn theorem_description() -> &'static str {
        "Ed25519 signature verification correctness: valid signatures always verify"
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
