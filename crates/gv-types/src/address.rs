use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Content address of a committed snapshot bundle.
///
/// The BLAKE3 digest of the bundle's files, as computed by
/// [`AddressHasher`]. Identical bundles always receive the same address.
/// Serialized as a 64-character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentAddress([u8; 32]);

impl ContentAddress {
    /// Create an address from a pre-computed digest.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.short_hex())
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ContentAddress {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Domain-separated BLAKE3 hasher for bundle addresses.
///
/// Files are fed in name order so that the address depends only on the set
/// of `(name, bytes)` pairs, never on submission order. Each file is framed
/// as `name NUL len(le u64) bytes` to keep boundaries unambiguous.
pub struct AddressHasher {
    inner: blake3::Hasher,
}

impl AddressHasher {
    /// Domain tag prepended to every bundle digest.
    pub const DOMAIN: &'static str = "gv-bundle-v1";

    pub fn new() -> Self {
        let mut inner = blake3::Hasher::new();
        inner.update(Self::DOMAIN.as_bytes());
        inner.update(b":");
        Self { inner }
    }

    /// Add one file. Callers must add files in ascending name order.
    pub fn update(&mut self, name: &str, data: &[u8]) -> &mut Self {
        self.inner.update(name.as_bytes());
        self.inner.update(&[0]);
        self.inner.update(&(data.len() as u64).to_le_bytes());
        self.inner.update(data);
        self
    }

    pub fn finalize(&self) -> ContentAddress {
        ContentAddress(*self.inner.finalize().as_bytes())
    }

    /// Address of a whole file set, sorting by name first.
    pub fn address_of<'a, I>(files: I) -> ContentAddress
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut files: Vec<(&str, &[u8])> = files.into_iter().collect();
        files.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = Self::new();
        for (name, data) in files {
            hasher.update(name, data);
        }
        hasher.finalize()
    }
}

impl Default for AddressHasher {
    fn default() -> Self {
        Self::new()
    }
}
