//! LE Secure Connections key agreement on P-256.
//!
//! The controller carries LESC keys little-endian: a 32-byte secret, a
//! 64-byte public key (X then Y) and a 32-byte DH key (X of the shared
//! point). To answer a `LescDhkeyRequest`, pass its `pk_peer` to
//! [`LescKeypair::dhkey`] and hand the result to `Session::reply_lesc_dhkey`.

use std::fmt;

use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{FieldBytes, PublicKey, SecretKey};
use rand_core::OsRng;

use crate::error::{Result, RpcError};

pub const SECRET_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 64;
pub const DHKEY_LEN: usize = 32;

/// Uncompressed SEC1 point tag.
const SEC1_UNCOMPRESSED: u8 = 0x04;

/// A P-256 key pair for LESC pairing.
#[derive(Clone)]
pub struct LescKeypair {
    secret: SecretKey,
}

impl LescKeypair {
    /// Fresh key pair from the OS random source.
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    /// Rebuild a key pair from a little-endian secret.
    pub fn from_secret_le(secret: &[u8; SECRET_KEY_LEN]) -> Result<Self> {
        let mut be = *secret;
        be.reverse();
        let secret = SecretKey::from_bytes(FieldBytes::from_slice(&be))
            .map_err(|_| RpcError::InvalidKey("secret key out of range"))?;
        Ok(Self { secret })
    }

    pub fn secret_le(&self) -> [u8; SECRET_KEY_LEN] {
        let mut out = [0u8; SECRET_KEY_LEN];
        out.copy_from_slice(&self.secret.to_bytes());
        out.reverse();
        out
    }

    /// Public key as sent to the controller.
    pub fn public_key_le(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.secret.public_key().to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(&point.as_bytes()[1..]);
        out[..32].reverse();
        out[32..].reverse();
        out
    }

    /// DH key shared with the peer whose public key is `peer_le`.
    pub fn dhkey(&self, peer_le: &[u8; PUBLIC_KEY_LEN]) -> Result<[u8; DHKEY_LEN]> {
        let peer = public_key_from_le(peer_le)?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer.as_affine());
        let mut out = [0u8; DHKEY_LEN];
        out.copy_from_slice(shared.raw_secret_bytes());
        out.reverse();
        Ok(out)
    }
}

impl fmt::Debug for LescKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LescKeypair").finish_non_exhaustive()
    }
}

fn public_key_from_le(key: &[u8; PUBLIC_KEY_LEN]) -> Result<PublicKey> {
    let mut sec1 = [0u8; 1 + PUBLIC_KEY_LEN];
    sec1[0] = SEC1_UNCOMPRESSED;
    sec1[1..].copy_from_slice(key);
    sec1[1..33].reverse();
    sec1[33..].reverse();
    PublicKey::from_sec1_bytes(&sec1).map_err(|_| RpcError::InvalidKey("public key not on curve"))
}
