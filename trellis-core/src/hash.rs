//! 128-bit Digests
//!
//! A [`Digest`] fingerprints everything that contributes to a plug's value
//! in a given context. It is the key of the compute cache, so two plugs
//! whose digests match share one cached value.
//!
//! [`Hasher`] is an order-sensitive accumulator. Variable length data is
//! length-prefixed so that `("ab", "c")` and `("a", "bc")` never collide.
//! A hasher that has had nothing appended finishes to [`Digest::NULL`],
//! which consumers use as the "nothing to do" sentinel.

use std::fmt;

/// A 128-bit fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest(u128);

impl Digest {
    /// The digest of "no dependency".
    pub const NULL: Digest = Digest(0);

    /// Build a digest from its raw value.
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// The raw 128-bit value.
    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    /// True for the null sentinel.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Order-independent combination, used for sets such as context
    /// variables.
    pub fn wrapping_add(self, other: Digest) -> Digest {
        Digest(self.0.wrapping_add(other.0))
    }

    /// Inverse of [`Digest::wrapping_add`].
    pub fn wrapping_sub(self, other: Digest) -> Digest {
        Digest(self.0.wrapping_sub(other.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({:032x})", self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Types that can fold themselves into a [`Hasher`].
pub trait HashAppend {
    /// Append this value's bytes, tagged so values of different types
    /// never collide.
    fn append_to(&self, h: &mut Hasher);
}

/// Incremental digest accumulator.
#[derive(Clone)]
pub struct Hasher {
    inner: blake3::Hasher,
    touched: bool,
}

impl Hasher {
    /// An empty hasher; finishing it straight away gives [`Digest::NULL`].
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
            touched: false,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        self.touched = true;
        self.inner.update(bytes);
    }

    /// Append a boolean as a single byte.
    pub fn append_bool(&mut self, v: bool) -> &mut Self {
        self.update(&[v as u8]);
        self
    }

    /// Append an unsigned integer, little endian.
    pub fn append_u64(&mut self, v: u64) -> &mut Self {
        self.update(&v.to_le_bytes());
        self
    }

    /// Append a signed integer, little endian.
    pub fn append_i64(&mut self, v: i64) -> &mut Self {
        self.update(&v.to_le_bytes());
        self
    }

    /// Floats hash by bit pattern, so `0.0` and `-0.0` differ.
    pub fn append_f64(&mut self, v: f64) -> &mut Self {
        self.update(&v.to_bits().to_le_bytes());
        self
    }

    /// Append a string, length-prefixed.
    pub fn append_str(&mut self, v: &str) -> &mut Self {
        self.append_bytes(v.as_bytes())
    }

    /// Append a byte slice, length-prefixed.
    pub fn append_bytes(&mut self, v: &[u8]) -> &mut Self {
        self.update(&(v.len() as u64).to_le_bytes());
        self.update(v);
        self
    }

    /// Append another digest, typically the hash of an upstream plug.
    pub fn append_digest(&mut self, d: Digest) -> &mut Self {
        self.update(&d.0.to_le_bytes());
        self
    }

    /// Append anything implementing [`HashAppend`], such as a [`Value`].
    ///
    /// [`Value`]: crate::value::Value
    pub fn append<T: HashAppend + ?Sized>(&mut self, v: &T) -> &mut Self {
        v.append_to(self);
        self
    }

    /// True if anything has been appended.
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// The accumulated digest, or [`Digest::NULL`] if nothing was appended.
    pub fn finish(&self) -> Digest {
        if !self.touched {
            return Digest::NULL;
        }
        let out = self.inner.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&out.as_bytes()[..16]);
        let value = u128::from_le_bytes(bytes);
        // Reserve zero for the sentinel.
        Digest(if value == 0 { 1 } else { value })
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Hasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("digest", &self.finish())
            .finish()
    }
}

impl HashAppend for str {
    fn append_to(&self, h: &mut Hasher) {
        h.append_str(self);
    }
}

impl HashAppend for Digest {
    fn append_to(&self, h: &mut Hasher) {
        h.append_digest(*self);
    }
}
