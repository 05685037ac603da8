use log::info;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;

use crate::telemetry::Telemetry;

/// Version byte prepended to the public key hash
pub const ADDRESS_VERSION: u8 = 0x00;

/// Length of the address checksum
pub const CHECKSUM_LEN: usize = 4;

/// Length of the versioned public key hash
pub const VERSIONED_PAYLOAD_LEN: usize = 21;

/// Length of the decoded address (versioned payload + checksum)
pub const ADDRESS_PAYLOAD_LEN: usize = VERSIONED_PAYLOAD_LEN + CHECKSUM_LEN;

/// Errors that can occur during wallet and address operations
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Failed to generate keypair: {0}")]
    KeyGeneration(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Invalid length: expected {expected} bytes, got {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("Unsupported address version: {0:#04x}")]
    InvalidVersion(u8),

    #[error("Address checksum mismatch")]
    ChecksumMismatch,
}

/// Represents a blockchain address
///
/// Wallet addresses are Base58Check strings, but the ledger accepts any
/// string as an address (including the reserved reward sender).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Derives the address of a public key
    ///
    /// SHA-256 then RIPEMD-160 of the X||Y coordinates, prefixed with the
    /// version byte, followed by the first four bytes of the double SHA-256
    /// of that payload, Base58 encoded.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let payload = versioned_payload(public_key);
        Address(encode_address(&payload))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes a wallet address back to its 25-byte payload
    ///
    /// Fails unless the string is valid Base58 of the right length, carries
    /// the expected version byte, and its checksum matches.
    pub fn decode_payload(&self) -> Result<[u8; ADDRESS_PAYLOAD_LEN], WalletError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| WalletError::Decoding(e.to_string()))?;

        let payload: [u8; ADDRESS_PAYLOAD_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::InvalidLength {
                    expected: ADDRESS_PAYLOAD_LEN,
                    found: bytes.len(),
                })?;

        if payload[0] != ADDRESS_VERSION {
            return Err(WalletError::InvalidVersion(payload[0]));
        }

        let (versioned, check) = payload.split_at(VERSIONED_PAYLOAD_LEN);
        if checksum(versioned) != check {
            return Err(WalletError::ChecksumMismatch);
        }

        Ok(payload)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

impl From<&Address> for Address {
    fn from(address: &Address) -> Self {
        address.clone()
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Serializes a public key as its big-endian X and Y coordinates (32 bytes each)
pub fn public_key_bytes(public_key: &PublicKey) -> [u8; 64] {
    let point = public_key.to_encoded_point(false);
    // uncompressed SEC1: 0x04 || X || Y
    let mut out = [0u8; 64];
    out.copy_from_slice(&point.as_bytes()[1..]);
    out
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// First four bytes of the double SHA-256 of `data`
pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = double_sha256(data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Version byte followed by RIPEMD-160(SHA-256(public key))
pub fn versioned_payload(public_key: &PublicKey) -> [u8; VERSIONED_PAYLOAD_LEN] {
    let key_hash = ripemd160(&sha256(&public_key_bytes(public_key)));

    let mut payload = [0u8; VERSIONED_PAYLOAD_LEN];
    payload[0] = ADDRESS_VERSION;
    payload[1..].copy_from_slice(&key_hash);
    payload
}

/// Appends the checksum to a versioned payload and Base58 encodes the result
pub fn encode_address(payload: &[u8; VERSIONED_PAYLOAD_LEN]) -> String {
    let mut full = [0u8; ADDRESS_PAYLOAD_LEN];
    full[..VERSIONED_PAYLOAD_LEN].copy_from_slice(payload);
    full[VERSIONED_PAYLOAD_LEN..].copy_from_slice(&checksum(payload));
    bs58::encode(full).into_string()
}

/// Represents a wallet with a P-256 keypair
#[derive(Clone)]
pub struct Wallet {
    private_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair from the OS random source
    pub fn new() -> Result<Self, WalletError> {
        Self::with_telemetry(Telemetry::default().child("wallet"))
    }

    /// Like `new`, logging through `telemetry`
    pub fn with_telemetry(telemetry: Telemetry) -> Result<Self, WalletError> {
        Self::from_rng(&mut OsRng, telemetry)
    }

    /// Creates a wallet with a keypair drawn from `rng`
    ///
    /// Draws again when the bytes are not a valid scalar (zero, or at least the
    /// curve order). Fails only if the random source cannot produce bytes;
    /// no partial wallet is ever returned.
    pub fn from_rng<R: RngCore + CryptoRng>(
        rng: &mut R,
        telemetry: Telemetry,
    ) -> Result<Self, WalletError> {
        let mut bytes = [0u8; 32];
        let private_key = loop {
            rng.try_fill_bytes(&mut bytes)
                .map_err(|e| WalletError::KeyGeneration(e.to_string()))?;

            if let Ok(private_key) = SecretKey::from_slice(&bytes) {
                break private_key;
            }
        };

        let wallet = Self::from_secret_key(private_key);
        info!(target: telemetry.target(), "Created wallet with address {}", wallet.address);
        Ok(wallet)
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(private_key: SecretKey) -> Self {
        let public_key = private_key.public_key();
        let address = Address::from_public_key(&public_key);

        Wallet {
            private_key,
            public_key,
            address,
        }
    }

    /// Restores a wallet from the hex rendering produced by `private_key_hex`
    pub fn from_private_key_hex(private_key: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(private_key).map_err(|e| WalletError::Decoding(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(WalletError::InvalidLength {
                expected: 32,
                found: bytes.len(),
            });
        }

        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| WalletError::InvalidPrivateKey("scalar out of range".to_string()))?;

        Ok(Self::from_secret_key(secret))
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn private_key(&self) -> &SecretKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Private scalar as 64 hex characters
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key.to_bytes())
    }

    /// X||Y coordinates as 128 hex characters
    pub fn public_key_hex(&self) -> String {
        hex::encode(public_key_bytes(&self.public_key))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("public_key", &self.public_key_hex())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy source unavailable"))
        }
    }

    impl CryptoRng for FailingRng {}

    /// Serves the queued 32-byte draws in order
    struct QueuedRng(Vec<[u8; 32]>);

    impl RngCore for QueuedRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            if self.0.is_empty() {
                return Err(rand::Error::new("queue drained"));
            }
            dest.copy_from_slice(&self.0.remove(0));
            Ok(())
        }
    }

    impl CryptoRng for QueuedRng {}

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new().unwrap();

        assert!(!wallet.address().as_str().is_empty());
        assert!(wallet.address().as_str().starts_with('1'));
        assert_eq!(wallet.private_key_hex().len(), 64);
        assert_eq!(wallet.public_key_hex().len(), 128);
    }

    #[test]
    fn test_address_is_reproducible() {
        let wallet = Wallet::new().unwrap();

        let again = Address::from_public_key(wallet.public_key());
        assert_eq!(&again, wallet.address());
    }

    #[test]
    fn test_address_payload_checksum() {
        let wallet = Wallet::new().unwrap();
        let payload = wallet.address().decode_payload().unwrap();

        assert_eq!(payload[0], ADDRESS_VERSION);
        assert_eq!(&payload[..VERSIONED_PAYLOAD_LEN], &versioned_payload(wallet.public_key()));
        assert_eq!(
            payload[VERSIONED_PAYLOAD_LEN..],
            double_sha256(&payload[..VERSIONED_PAYLOAD_LEN])[..CHECKSUM_LEN]
        );
    }

    #[test]
    fn test_address_stages() {
        let wallet = Wallet::new().unwrap();
        let key_bytes = public_key_bytes(wallet.public_key());
        let payload = versioned_payload(wallet.public_key());

        assert_eq!(hex::encode(key_bytes), wallet.public_key_hex());
        assert_eq!(payload[0], 0x00);
        assert_eq!(payload[1..], ripemd160(&sha256(&key_bytes)));
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hex::encode(ripemd160(b"")),
            "9c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
        assert_eq!(
            hex::encode(ripemd160(b"abc")),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
    }

    #[test]
    fn test_known_address_encoding() {
        let mut payload = [0u8; VERSIONED_PAYLOAD_LEN];
        payload[1..].copy_from_slice(
            &hex::decode("010966776006953d5567439e5e39f86a0d273bee").unwrap(),
        );

        assert_eq!(hex::encode(checksum(&payload)), "d61967f6");
        assert_eq!(encode_address(&payload), "16UwLL9Risc3QfPqBUvKofHmBQ7wMtjvM");
    }

    #[test]
    fn test_leading_zero_bytes_encode_as_ones() {
        let payload = [0u8; VERSIONED_PAYLOAD_LEN];
        assert_eq!(encode_address(&payload), "1111111111111111111114oLvT2");
    }

    #[test]
    fn test_restore_from_private_key_hex() {
        let wallet = Wallet::new().unwrap();
        let restored = Wallet::from_private_key_hex(&wallet.private_key_hex()).unwrap();

        assert_eq!(restored.address(), wallet.address());
        assert_eq!(restored.public_key_hex(), wallet.public_key_hex());
    }

    #[test]
    fn test_restore_rejects_bad_keys() {
        assert!(matches!(
            Wallet::from_private_key_hex("zz"),
            Err(WalletError::Decoding(_))
        ));
        assert!(matches!(
            Wallet::from_private_key_hex("abcd"),
            Err(WalletError::InvalidLength { expected: 32, found: 2 })
        ));
        assert!(matches!(
            Wallet::from_private_key_hex(&"00".repeat(32)),
            Err(WalletError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let first = Wallet::from_rng(&mut StdRng::seed_from_u64(7), Telemetry::default()).unwrap();
        let second = Wallet::from_rng(&mut StdRng::seed_from_u64(7), Telemetry::default()).unwrap();

        assert_eq!(first.address(), second.address());
        assert_eq!(first.private_key_hex(), second.private_key_hex());
    }

    #[test]
    fn test_key_generation_failure() {
        let result = Wallet::from_rng(&mut FailingRng, Telemetry::default());
        assert!(matches!(result, Err(WalletError::KeyGeneration(_))));
    }

    #[test]
    fn test_out_of_range_scalar_is_redrawn() {
        // zero and anything at or above the curve order are not valid scalars
        let mut rng = QueuedRng(vec![[0x00; 32], [0xff; 32], [0x11; 32]]);
        let wallet = Wallet::from_rng(&mut rng, Telemetry::default()).unwrap();

        assert_eq!(wallet.private_key_hex(), hex::encode([0x11u8; 32]));
        assert!(rng.0.is_empty());
    }

    #[test]
    fn test_decode_rejects_tampered_address() {
        let wallet = Wallet::new().unwrap();
        let mut payload = wallet.address().decode_payload().unwrap();
        payload[5] ^= 0x01;
        let tampered = Address(bs58::encode(payload).into_string());

        assert!(matches!(tampered.decode_payload(), Err(WalletError::ChecksumMismatch)));
        assert!(matches!(
            Address::from("0OIl").decode_payload(),
            Err(WalletError::Decoding(_))
        ));
        assert!(matches!(
            Address::from("A").decode_payload(),
            Err(WalletError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let wallet = Wallet::new().unwrap();
        let printed = format!("{:?}", wallet);

        assert!(!printed.contains(&wallet.private_key_hex()));
        assert!(printed.contains(wallet.address().as_str()));
    }
}
