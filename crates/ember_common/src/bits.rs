//! Fixed-width two-state bit vectors for signal values.
//!
//! Every signal in an elaborated design has a width that never changes, and
//! every runtime value is a [`Bits`] tagged with its width. Operations that
//! combine values of different widths zero-extend the narrower operand;
//! narrowing and widening are always explicit ([`Bits::truncate`],
//! [`Bits::zext`], [`Bits::sext`], [`Bits::fit`]).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// Number of bits stored per word.
const WORD_BITS: u32 = 64;

/// Errors produced when constructing a [`Bits`] value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitsError {
    /// The value has set bits above the requested width.
    #[error("value {value:#x} does not fit in {width} bits")]
    ValueTooWide {
        /// The rejected value.
        value: u64,
        /// The requested width.
        width: u32,
    },
}

/// A two-state bit vector with a fixed width.
///
/// Bits are stored little-endian in `u64` words. Bits at positions at or above
/// `width` are always zero, so derived equality and hashing compare values.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bits {
    width: u32,
    words: Vec<u64>,
}

impl Bits {
    /// Creates an all-zero vector of the given width.
    pub fn zero(width: u32) -> Self {
        Self {
            width,
            words: vec![0; word_count(width)],
        }
    }

    /// Creates an all-one vector of the given width.
    pub fn ones(width: u32) -> Self {
        let mut v = Self {
            width,
            words: vec![u64::MAX; word_count(width)],
        };
        v.mask_top();
        v
    }

    /// Creates a vector holding `value`, rejecting values wider than `width`.
    pub fn new(width: u32, value: u64) -> Result<Self, BitsError> {
        if width < WORD_BITS && (value >> width) != 0 {
            return Err(BitsError::ValueTooWide { value, width });
        }
        Ok(Self::truncated(width, value))
    }

    /// Creates a vector holding the low `width` bits of `value`.
    pub fn truncated(width: u32, value: u64) -> Self {
        let mut v = Self::zero(width);
        if let Some(w) = v.words.first_mut() {
            *w = value;
        }
        v.mask_top();
        v
    }

    /// Two's-complement bits of `value` at `width`, sign-extended past 64 bits.
    pub fn from_i64(width: u32, value: i64) -> Self {
        if width <= 64 {
            Self::truncated(width, value as u64)
        } else {
            Self::truncated(64, value as u64).sext(width)
        }
    }

    /// Creates a vector from little-endian words, keeping the low `width` bits.
    pub fn from_words(width: u32, words: &[u64]) -> Self {
        let mut v = Self::zero(width);
        for (dst, src) in v.words.iter_mut().zip(words) {
            *dst = *src;
        }
        v.mask_top();
        v
    }

    /// Creates a single-bit vector from a boolean.
    pub fn from_bool(value: bool) -> Self {
        Self::truncated(1, value as u64)
    }

    /// Parses a binary string such as `"1010_0101"` (most significant bit first).
    ///
    /// Underscores are ignored. Returns `None` for any other character.
    pub fn from_binary_str(s: &str) -> Option<Self> {
        let digits: Vec<char> = s.chars().filter(|c| *c != '_').collect();
        let mut v = Self::zero(digits.len() as u32);
        for (i, c) in digits.iter().rev().enumerate() {
            match c {
                '0' => {}
                '1' => v.set_bit(i as u32, true),
                _ => return None,
            }
        }
        Some(v)
    }

    /// Returns the width in bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the little-endian storage words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Returns the bit at `index`; positions at or above the width read as `false`.
    pub fn bit(&self, index: u32) -> bool {
        if index >= self.width {
            return false;
        }
        let word = self.words[(index / WORD_BITS) as usize];
        (word >> (index % WORD_BITS)) & 1 == 1
    }

    /// Sets the bit at `index`. Positions at or above the width are ignored.
    pub fn set_bit(&mut self, index: u32, value: bool) {
        if index >= self.width {
            return;
        }
        let word = &mut self.words[(index / WORD_BITS) as usize];
        let mask = 1u64 << (index % WORD_BITS);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Returns the most significant bit.
    pub fn msb(&self) -> bool {
        self.width > 0 && self.bit(self.width - 1)
    }

    /// Returns `true` if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Returns the value as a `u64` if no bit at position 64 or above is set.
    pub fn to_u64(&self) -> Option<u64> {
        if self.words.iter().skip(1).any(|w| *w != 0) {
            return None;
        }
        Some(self.low_u64())
    }

    /// Returns the low 64 bits, discarding anything above.
    pub fn low_u64(&self) -> u64 {
        self.words.first().copied().unwrap_or(0)
    }

    /// Keeps the low `width` bits. A wider `width` zero-extends.
    pub fn truncate(&self, width: u32) -> Self {
        Self::from_words(width, &self.words)
    }

    /// Zero-extends to `width`. A narrower `width` truncates.
    pub fn zext(&self, width: u32) -> Self {
        Self::from_words(width, &self.words)
    }

    /// Sign-extends to `width` using the current most significant bit.
    /// A narrower `width` truncates.
    pub fn sext(&self, width: u32) -> Self {
        let mut v = self.zext(width);
        if width > self.width && self.msb() {
            for i in self.width..width {
                v.set_bit(i, true);
            }
        }
        v
    }

    /// Converts to `width`: truncates when narrowing, sign- or zero-extends
    /// when widening depending on `signed`.
    pub fn fit(&self, width: u32, signed: bool) -> Self {
        if width <= self.width || !signed {
            self.zext(width)
        } else {
            self.sext(width)
        }
    }

    /// Extracts `width` bits starting at bit `lo`. Bits past the end read as zero.
    pub fn slice(&self, lo: u32, width: u32) -> Self {
        if lo == 0 {
            return self.zext(width);
        }
        let shifted = self.shr(lo as u64);
        shifted.zext(width)
    }

    /// Returns a copy with bits `[lo, lo + value.width())` replaced by `value`.
    /// Bits that fall past the end of `self` are dropped.
    pub fn with_slice(&self, lo: u32, value: &Bits) -> Self {
        let mut out = self.clone();
        for i in 0..value.width {
            let Some(dst) = lo.checked_add(i) else { break };
            if dst >= self.width {
                break;
            }
            out.set_bit(dst, value.bit(i));
        }
        out
    }

    /// Concatenates `parts`, the first part occupying the most significant bits.
    pub fn concat(parts: &[Bits]) -> Self {
        let width: u32 = parts.iter().map(|p| p.width).sum();
        let mut out = Self::zero(width);
        let mut offset = 0u32;
        for part in parts.iter().rev() {
            out = out.with_slice(offset, part);
            offset += part.width;
        }
        out
    }

    /// Wrapping addition at the wider operand width.
    pub fn add(&self, rhs: &Bits) -> Self {
        let width = self.width.max(rhs.width);
        let (a, b) = (self.zext(width), rhs.zext(width));
        let mut out = Self::zero(width);
        let mut carry = 0u128;
        for i in 0..out.words.len() {
            let sum = a.words[i] as u128 + b.words[i] as u128 + carry;
            out.words[i] = sum as u64;
            carry = sum >> 64;
        }
        out.mask_top();
        out
    }

    /// Wrapping subtraction at the wider operand width.
    pub fn sub(&self, rhs: &Bits) -> Self {
        let width = self.width.max(rhs.width);
        let inverted = !&rhs.zext(width);
        self.zext(width)
            .add(&inverted)
            .add(&Self::truncated(width, 1))
    }

    /// Two's-complement negation at the current width.
    pub fn neg(&self) -> Self {
        Self::zero(self.width).sub(self)
    }

    /// Wrapping multiplication at the wider operand width.
    pub fn mul(&self, rhs: &Bits) -> Self {
        let width = self.width.max(rhs.width);
        if let (Some(a), Some(b)) = (self.to_u64(), rhs.to_u64()) {
            return Self::from_words(width, &split_u128((a as u128).wrapping_mul(b as u128)));
        }
        let (a, b) = (self.zext(width), rhs.zext(width));
        let n = a.words.len();
        let mut out = Self::zero(width);
        for i in 0..n {
            let mut carry = 0u128;
            for j in 0..(n - i) {
                let t = out.words[i + j] as u128 + a.words[i] as u128 * b.words[j] as u128 + carry;
                out.words[i + j] = t as u64;
                carry = t >> 64;
            }
        }
        out.mask_top();
        out
    }

    /// Unsigned division at the wider operand width, `None` when `rhs` is zero.
    pub fn checked_div(&self, rhs: &Bits) -> Option<Self> {
        self.divmod(rhs).map(|(q, _)| q)
    }

    /// Unsigned remainder at the wider operand width, `None` when `rhs` is zero.
    pub fn checked_rem(&self, rhs: &Bits) -> Option<Self> {
        self.divmod(rhs).map(|(_, r)| r)
    }

    fn divmod(&self, rhs: &Bits) -> Option<(Self, Self)> {
        if rhs.is_zero() {
            return None;
        }
        let width = self.width.max(rhs.width);
        if let (Some(a), Some(b)) = (self.to_u64(), rhs.to_u64()) {
            return Some((Self::truncated(width, a / b), Self::truncated(width, a % b)));
        }
        let divisor = rhs.zext(width + 1);
        let mut quotient = Self::zero(width);
        let mut rem = Self::zero(width + 1);
        for i in (0..width).rev() {
            rem = rem.shl(1);
            rem.set_bit(0, self.bit(i));
            if rem.cmp_unsigned(&divisor) != Ordering::Less {
                rem = rem.sub(&divisor);
                quotient.set_bit(i, true);
            }
        }
        Some((quotient, rem.truncate(width)))
    }

    /// Logical left shift; the width is unchanged.
    pub fn shl(&self, amount: u64) -> Self {
        if amount >= self.width as u64 {
            return Self::zero(self.width);
        }
        let word_shift = (amount / WORD_BITS as u64) as usize;
        let bit_shift = (amount % WORD_BITS as u64) as u32;
        let mut out = Self::zero(self.width);
        for i in (word_shift..self.words.len()).rev() {
            let src = i - word_shift;
            let mut w = self.words[src] << bit_shift;
            if bit_shift > 0 && src > 0 {
                w |= self.words[src - 1] >> (WORD_BITS - bit_shift);
            }
            out.words[i] = w;
        }
        out.mask_top();
        out
    }

    /// Logical right shift; the width is unchanged.
    pub fn shr(&self, amount: u64) -> Self {
        if amount >= self.width as u64 {
            return Self::zero(self.width);
        }
        let word_shift = (amount / WORD_BITS as u64) as usize;
        let bit_shift = (amount % WORD_BITS as u64) as u32;
        let n = self.words.len();
        let mut out = Self::zero(self.width);
        for i in 0..(n - word_shift) {
            let src = i + word_shift;
            let mut w = self.words[src] >> bit_shift;
            if bit_shift > 0 && src + 1 < n {
                w |= self.words[src + 1] << (WORD_BITS - bit_shift);
            }
            out.words[i] = w;
        }
        out
    }

    /// Compares two values as unsigned integers regardless of width.
    pub fn cmp_unsigned(&self, rhs: &Bits) -> Ordering {
        let n = self.words.len().max(rhs.words.len());
        for i in (0..n).rev() {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = rhs.words.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// Returns `true` if the values are numerically equal regardless of width.
    pub fn value_eq(&self, rhs: &Bits) -> bool {
        self.cmp_unsigned(rhs) == Ordering::Equal
    }

    /// AND-reduction: `true` if every bit is set.
    pub fn reduce_and(&self) -> bool {
        *self == Self::ones(self.width)
    }

    /// OR-reduction: `true` if any bit is set.
    pub fn reduce_or(&self) -> bool {
        !self.is_zero()
    }

    /// XOR-reduction: `true` if an odd number of bits is set.
    pub fn reduce_xor(&self) -> bool {
        self.words.iter().map(|w| w.count_ones()).sum::<u32>() % 2 == 1
    }

    /// Formats the value as zero-padded lowercase hex digits (one digit per 4 bits).
    pub fn to_hex(&self) -> String {
        let digits = self.width.div_ceil(4).max(1);
        let mut s = String::with_capacity(digits as usize);
        for d in (0..digits).rev() {
            let nibble = self.slice(d * 4, 4).low_u64();
            s.push(char::from_digit(nibble as u32, 16).unwrap_or('0'));
        }
        s
    }

    fn mask_top(&mut self) {
        let rem = self.width % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    fn zip_words(&self, rhs: &Bits, f: impl Fn(u64, u64) -> u64) -> Bits {
        let width = self.width.max(rhs.width);
        let (a, b) = (self.zext(width), rhs.zext(width));
        let words: Vec<u64> = a.words.iter().zip(&b.words).map(|(x, y)| f(*x, *y)).collect();
        Bits::from_words(width, &words)
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'h{}", self.width, self.to_hex())
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bits({self})")
    }
}

impl BitAnd for &Bits {
    type Output = Bits;

    fn bitand(self, rhs: Self) -> Bits {
        self.zip_words(rhs, |a, b| a & b)
    }
}

impl BitOr for &Bits {
    type Output = Bits;

    fn bitor(self, rhs: Self) -> Bits {
        self.zip_words(rhs, |a, b| a | b)
    }
}

impl BitXor for &Bits {
    type Output = Bits;

    fn bitxor(self, rhs: Self) -> Bits {
        self.zip_words(rhs, |a, b| a ^ b)
    }
}

impl Not for &Bits {
    type Output = Bits;

    fn not(self) -> Bits {
        let words: Vec<u64> = self.words.iter().map(|w| !w).collect();
        Bits::from_words(self.width, &words)
    }
}

/// Returns the number of u64 words needed to store `width` bits.
fn word_count(width: u32) -> usize {
    width.div_ceil(WORD_BITS) as usize
}

fn split_u128(v: u128) -> [u64; 2] {
    [v as u64, (v >> 64) as u64]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(width: u32, value: u64) -> Bits {
        Bits::new(width, value).unwrap()
    }

    #[test]
    fn new_rejects_wide_value() {
        assert_eq!(
            Bits::new(4, 0x1f),
            Err(BitsError::ValueTooWide {
                value: 0x1f,
                width: 4
            })
        );
        assert!(Bits::new(64, u64::MAX).is_ok());
    }

    #[test]
    fn truncated_keeps_low_bits() {
        let v = Bits::truncated(4, 0xab);
        assert_eq!(v.to_u64(), Some(0xb));
        assert_eq!(v.width(), 4);
    }

    #[test]
    fn from_binary_str() {
        let v = Bits::from_binary_str("1010_0101").unwrap();
        assert_eq!(v.width(), 8);
        assert_eq!(v.to_u64(), Some(0xa5));
        assert!(Bits::from_binary_str("10x1").is_none());
    }

    #[test]
    fn display_and_hex() {
        assert_eq!(format!("{}", b(8, 0x2a)), "8'h2a");
        assert_eq!(b(5, 0x1f).to_hex(), "1f");
        assert_eq!(b(1, 1).to_hex(), "1");
        assert_eq!(format!("{:?}", b(4, 3)), "Bits(4'h3)");
    }

    #[test]
    fn set_and_get_across_words() {
        let mut v = Bits::zero(100);
        v.set_bit(0, true);
        v.set_bit(70, true);
        v.set_bit(99, true);
        assert!(v.bit(0));
        assert!(v.bit(70));
        assert!(v.bit(99));
        assert!(!v.bit(1));
        assert!(!v.bit(200));
        assert_eq!(v.to_u64(), None);
        assert_eq!(v.low_u64(), 1);
    }

    #[test]
    fn truncate_then_read_gives_low_bits() {
        let v = b(16, 0xbeef);
        assert_eq!(v.truncate(8).to_u64(), Some(0xef));
        assert_eq!(v.truncate(4).to_u64(), Some(0xf));
    }

    #[test]
    fn zero_and_sign_extension() {
        let v = b(4, 0b1010);
        assert_eq!(v.zext(8).to_u64(), Some(0b0000_1010));
        assert_eq!(v.sext(8).to_u64(), Some(0b1111_1010));
        let pos = b(4, 0b0101);
        assert_eq!(pos.sext(8).to_u64(), Some(0b0000_0101));
        assert_eq!(v.fit(8, true), v.sext(8));
        assert_eq!(v.fit(8, false), v.zext(8));
        assert_eq!(v.fit(2, true).to_u64(), Some(0b10));
    }

    #[test]
    fn sign_extension_across_word_boundary() {
        let v = Bits::ones(60).sext(130);
        assert_eq!(v, Bits::ones(130));
    }

    #[test]
    fn from_i64_is_twos_complement() {
        assert_eq!(Bits::from_i64(4, -1), b(4, 0xf));
        assert_eq!(Bits::from_i64(8, 300), b(8, 44));
        assert_eq!(Bits::from_i64(72, -2), Bits::ones(72).sub(&b(72, 1)));
    }

    #[test]
    fn slice_and_with_slice() {
        let v = b(16, 0xabcd);
        assert_eq!(v.slice(4, 8).to_u64(), Some(0xbc));
        assert_eq!(v.slice(12, 8).to_u64(), Some(0x0a));
        let w = v.with_slice(8, &b(4, 0x1));
        assert_eq!(w.to_u64(), Some(0xa1cd));
        let clipped = v.with_slice(14, &b(4, 0x0));
        assert_eq!(clipped.to_u64(), Some(0x2bcd));
    }

    #[test]
    fn concat_msb_first() {
        let v = Bits::concat(&[b(4, 0xa), b(8, 0x5c)]);
        assert_eq!(v.width(), 12);
        assert_eq!(v.to_u64(), Some(0xa5c));
    }

    #[test]
    fn add_wraps_at_width() {
        assert_eq!(b(8, 0xff).add(&b(8, 1)).to_u64(), Some(0));
        assert_eq!(b(8, 0xf0).add(&b(4, 0xf)).to_u64(), Some(0xff));
        let big = Bits::ones(100).add(&Bits::truncated(100, 1));
        assert!(big.is_zero());
    }

    #[test]
    fn sub_and_neg() {
        assert_eq!(b(8, 3).sub(&b(8, 5)).to_u64(), Some(0xfe));
        assert_eq!(b(8, 1).neg().to_u64(), Some(0xff));
        assert_eq!(b(8, 0).neg().to_u64(), Some(0));
    }

    #[test]
    fn mul_wide() {
        assert_eq!(b(8, 16).mul(&b(8, 17)).to_u64(), Some(16));
        let x = Bits::truncated(128, u64::MAX);
        let sq = x.mul(&x);
        assert_eq!(sq.words(), &[1, u64::MAX - 1]);
    }

    #[test]
    fn division() {
        assert_eq!(b(8, 200).checked_div(&b(8, 7)).unwrap().to_u64(), Some(28));
        assert_eq!(b(8, 200).checked_rem(&b(8, 7)).unwrap().to_u64(), Some(4));
        assert!(b(8, 1).checked_div(&b(8, 0)).is_none());
        let wide = Bits::from_words(96, &[10, 1]);
        let q = wide.checked_div(&Bits::truncated(96, 2)).unwrap();
        assert_eq!(q.words(), &[(1u64 << 63) + 5, 0]);
    }

    #[test]
    fn shifts() {
        assert_eq!(b(8, 0b1001).shl(2).to_u64(), Some(0b100100));
        assert_eq!(b(8, 0x81).shl(1).to_u64(), Some(0x02));
        assert_eq!(b(8, 0x80).shr(7).to_u64(), Some(1));
        assert_eq!(b(8, 0x80).shr(8).to_u64(), Some(0));
        let v = Bits::truncated(128, 1).shl(100);
        assert!(v.bit(100));
        assert_eq!(v.shr(100).to_u64(), Some(1));
    }

    #[test]
    fn comparisons_ignore_width() {
        assert_eq!(b(4, 3).cmp_unsigned(&b(16, 3)), Ordering::Equal);
        assert_eq!(b(4, 3).cmp_unsigned(&b(16, 300)), Ordering::Less);
        assert!(b(4, 9).value_eq(&b(8, 9)));
    }

    #[test]
    fn reductions() {
        assert!(b(4, 0xf).reduce_and());
        assert!(!b(4, 0x7).reduce_and());
        assert!(b(4, 0x4).reduce_or());
        assert!(!b(4, 0).reduce_or());
        assert!(b(4, 0b0111).reduce_xor());
        assert!(!b(4, 0b0110).reduce_xor());
    }

    #[test]
    fn bitwise_operators_extend() {
        let a = b(4, 0b1100);
        let c = b(8, 0b1010_1010);
        assert_eq!((&a & &c).to_u64(), Some(0b1000));
        assert_eq!((&a | &c).to_u64(), Some(0b1010_1110));
        assert_eq!((&a ^ &c).to_u64(), Some(0b1010_0110));
        assert_eq!((!&a).to_u64(), Some(0b0011));
    }

    #[test]
    fn serde_roundtrip() {
        let v = Bits::from_words(70, &[5, 0x3f]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Bits = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
