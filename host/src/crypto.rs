//! Schnorr and SHA-256 primitives behind the hosted crypto functions.
//!
//! Signatures are BIP-340 Schnorr over secp256k1 with x-only public keys.
//! Every entry point checks input lengths first; a wrong length, an invalid
//! secret key (zero or not below the curve order), a malformed public key and
//! a malformed signature all collapse into the same sentinel (`None` or
//! `false`). Callers only ever look at the length or the boolean.
//!
//! Signing uses an all-zero auxiliary random input, so a given (key, digest)
//! pair always produces the same signature.

use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use sigil_hostapi::types::{DIGEST_LEN, PUBLIC_KEY_LEN, SECRET_KEY_LEN, SIGNATURE_LEN};
use sigil_hostapi::{Capabilities, HostError};

/// Auxiliary randomness fed to BIP-340 signing.
const AUX_RAND: [u8; 32] = [0u8; 32];

/// x coordinate of the secp256k1 generator, i.e. the x-only key of scalar 1.
const GENERATOR_X: [u8; PUBLIC_KEY_LEN] = [
    0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b, 0x07,
    0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17, 0x98,
];

/// Long-lived curve handle owned by the host environment.
///
/// Created once per run. Creation runs a self-test so a broken curve
/// backend is caught before the managed program starts.
#[derive(Debug)]
pub struct CurveContext {
    capabilities: Capabilities,
}

impl CurveContext {
    pub fn new(capabilities: Capabilities) -> Result<Self, HostError> {
        self_test()?;
        tracing::debug!(?capabilities, "curve context ready");
        Ok(Self { capabilities })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Derive the x-only public key of `secret_key`.
    pub fn public_key(&self, secret_key: &[u8]) -> Option<[u8; PUBLIC_KEY_LEN]> {
        if !self.capabilities.sign {
            return None;
        }
        let signing_key = signing_key(secret_key)?;
        Some(x_only(signing_key.verifying_key()))
    }

    /// Sign a 32-byte digest.
    pub fn sign(&self, secret_key: &[u8], digest: &[u8]) -> Option<[u8; SIGNATURE_LEN]> {
        if !self.capabilities.sign {
            return None;
        }
        let digest: [u8; DIGEST_LEN] = digest.try_into().ok()?;
        let signing_key = signing_key(secret_key)?;
        let signature = signing_key.sign_raw(&digest, &AUX_RAND).ok()?;

        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&signature.to_bytes()[..]);
        Some(out)
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify(&self, public_key: &[u8], digest: &[u8], signature: &[u8]) -> bool {
        if !self.capabilities.verify {
            return false;
        }
        if public_key.len() != PUBLIC_KEY_LEN || signature.len() != SIGNATURE_LEN {
            return false;
        }
        let Ok(digest) = <[u8; DIGEST_LEN]>::try_from(digest) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        verifying_key.verify_raw(&digest, &signature).is_ok()
    }
}

/// SHA-256 of `message`.
pub fn sha256(message: &[u8]) -> [u8; DIGEST_LEN] {
    let result = Sha256::digest(message);
    let mut hash = [0u8; DIGEST_LEN];
    hash.copy_from_slice(&result);
    hash
}

/// SHA-256 of `message` as lowercase hex.
pub fn sha256_hex(message: &[u8]) -> String {
    hex::encode(sha256(message))
}

fn signing_key(secret_key: &[u8]) -> Option<SigningKey> {
    if secret_key.len() != SECRET_KEY_LEN {
        return None;
    }
    SigningKey::from_bytes(secret_key).ok()
}

fn x_only(verifying_key: &VerifyingKey) -> [u8; PUBLIC_KEY_LEN] {
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(&verifying_key.to_bytes()[..]);
    out
}

/// Scalar 1 must map to the generator, and a signature made with it must
/// verify.
fn self_test() -> Result<(), HostError> {
    let mut one = [0u8; SECRET_KEY_LEN];
    one[SECRET_KEY_LEN - 1] = 1;

    let key = signing_key(&one).ok_or_else(|| HostError::curve_context("scalar 1 rejected"))?;
    let public_key = x_only(key.verifying_key());
    if public_key != GENERATOR_X {
        return Err(HostError::curve_context("generator mismatch"));
    }

    let digest = sha256(b"sigil curve self-test");
    let signature = key
        .sign_raw(&digest, &AUX_RAND)
        .map_err(|e| HostError::curve_context(format!("self-test signing failed: {}", e)))?;
    key.verifying_key()
        .verify_raw(&digest, &signature)
        .map_err(|e| HostError::curve_context(format!("self-test verification failed: {}", e)))?;
    Ok(())
}
