//! Elias-Fano coding of non-decreasing `u32` sequences.
//!
//! For `n` values with maximum `M`, each value is split into `l =
//! floor(log2((M + 1) / n))` low bits, stored densely, and a high part
//! stored in unary in a bitmap with exactly `n` ones: element `i` sets bit
//! `(v >> l) + i`. Space is roughly `n * (l + 2)` bits.

use crate::utils::{u32_at, u64_at};

/// Serialized header: n (u32), l (u8), 3 pad bytes, low word count (u32), high word count (u32)
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EliasFano {
    len: usize,
    low_bits: u32,
    low: Vec<u64>,
    high: Vec<u64>,
}

impl EliasFano {
    /// Encode a non-decreasing sequence.
    ///
    /// The sequence is not checked; a decreasing step corrupts the high-bits
    /// bitmap. Posting lists are built in doc-id order, which satisfies this.
    pub fn build(values: &[u32]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self::default();
        }

        let max = values[n - 1] as u64;
        let low_bits = low_bits_for(max, n);

        let low_total = n * low_bits as usize;
        let mut low = vec![0u64; low_total.div_ceil(64)];

        let high_total = n + (max >> low_bits) as usize + 1;
        let mut high = vec![0u64; high_total.div_ceil(64)];

        let low_mask = mask(low_bits);
        for (i, &v) in values.iter().enumerate() {
            let v = v as u64;
            if low_bits > 0 {
                write_bits(&mut low, i * low_bits as usize, low_bits, v & low_mask);
            }
            let pos = (v >> low_bits) as usize + i;
            high[pos / 64] |= 1u64 << (pos % 64);
        }

        Self {
            len: n,
            low_bits,
            low,
            high,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of low bits per element
    pub fn low_bits(&self) -> u32 {
        self.low_bits
    }

    /// Value at position `i`. Out-of-range positions return 0; callers
    /// check `i < len()` themselves.
    pub fn get(&self, i: usize) -> u32 {
        if i >= self.len {
            return 0;
        }
        let Some(pos) = self.select1(i) else {
            return 0;
        };
        let high = (pos - i) as u64;
        ((high << self.low_bits) | self.read_low(i)) as u32
    }

    /// Sequential decoder; much cheaper than repeated `get`
    pub fn iter(&self) -> EliasFanoIter<'_> {
        EliasFanoIter {
            ef: self,
            index: 0,
            word_index: 0,
            current: self.high.first().copied().unwrap_or(0),
        }
    }

    /// Encoded size of the bit arrays in bits
    pub fn size_bits(&self) -> usize {
        (self.low.len() + self.high.len()) * 64
    }

    /// Approximate heap + inline footprint in bytes
    pub fn memory_bytes(&self) -> usize {
        (self.low.len() + self.high.len()) * 8 + std::mem::size_of::<Self>()
    }

    /// Serialized length of [`write_to`](Self::write_to)
    pub fn serialized_len(&self) -> usize {
        HEADER_LEN + (self.low.len() + self.high.len()) * 8
    }

    /// Append the little-endian serialized form to `buf`
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.len as u32).to_le_bytes());
        buf.push(self.low_bits as u8);
        buf.extend_from_slice(&[0u8; 3]);
        buf.extend_from_slice(&(self.low.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.high.len() as u32).to_le_bytes());
        for word in self.low.iter().chain(self.high.iter()) {
            buf.extend_from_slice(&word.to_le_bytes());
        }
    }

    /// Parse a serialized sequence. Returns (sequence, bytes_consumed), or
    /// None if the buffer is truncated or the header is inconsistent.
    pub fn read_from(buf: &[u8]) -> Option<(Self, usize)> {
        let len = u32_at(buf, 0)? as usize;
        let low_bits = *buf.get(4)? as u32;
        let low_words = u32_at(buf, 8)? as usize;
        let high_words = u32_at(buf, 12)? as usize;

        if low_bits > 32 || low_words < (len * low_bits as usize).div_ceil(64) {
            return None;
        }
        if high_words * 64 < len {
            return None;
        }

        let total = HEADER_LEN + (low_words + high_words) * 8;
        if buf.len() < total {
            return None;
        }

        let mut words = (0..low_words + high_words).map(|w| u64_at(buf, HEADER_LEN + w * 8));
        let low = words.by_ref().take(low_words).collect::<Option<Vec<_>>>()?;
        let high = words.collect::<Option<Vec<_>>>()?;

        let ones: usize = high.iter().map(|w| w.count_ones() as usize).sum();
        if ones != len {
            return None;
        }

        Some((
            Self {
                len,
                low_bits,
                low,
                high,
            },
            total,
        ))
    }

    /// Position of the `rank`-th set bit (0-based) in the high bitmap
    fn select1(&self, mut rank: usize) -> Option<usize> {
        for (wi, &word) in self.high.iter().enumerate() {
            let ones = word.count_ones() as usize;
            if rank < ones {
                let mut w = word;
                for _ in 0..rank {
                    w &= w - 1;
                }
                return Some(wi * 64 + w.trailing_zeros() as usize);
            }
            rank -= ones;
        }
        None
    }

    #[inline]
    fn read_low(&self, i: usize) -> u64 {
        if self.low_bits == 0 {
            return 0;
        }
        read_bits(&self.low, i * self.low_bits as usize, self.low_bits)
    }
}

/// Iterator over an [`EliasFano`] sequence in order
pub struct EliasFanoIter<'a> {
    ef: &'a EliasFano,
    index: usize,
    word_index: usize,
    current: u64,
}

impl Iterator for EliasFanoIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.index >= self.ef.len {
            return None;
        }
        while self.current == 0 {
            self.word_index += 1;
            self.current = *self.ef.high.get(self.word_index)?;
        }
        let tz = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;

        let pos = self.word_index * 64 + tz;
        let high = (pos - self.index) as u64;
        let value = (high << self.ef.low_bits) | self.ef.read_low(self.index);
        self.index += 1;
        Some(value as u32)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ef.len - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for EliasFanoIter<'_> {}

fn low_bits_for(max: u64, n: usize) -> u32 {
    let ratio = (max + 1) / n as u64;
    if ratio <= 1 {
        0
    } else {
        63 - ratio.leading_zeros()
    }
}

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Write `bits` bits of `value` at bit position `pos`, possibly spanning two words
#[inline]
fn write_bits(words: &mut [u64], pos: usize, bits: u32, value: u64) {
    let word = pos / 64;
    let offset = (pos % 64) as u32;
    words[word] |= value << offset;
    if offset + bits > 64 {
        words[word + 1] |= value >> (64 - offset);
    }
}

#[inline]
fn read_bits(words: &[u64], pos: usize, bits: u32) -> u64 {
    let word = pos / 64;
    let offset = (pos % 64) as u32;
    let mut value = words[word] >> offset;
    if offset + bits > 64 {
        value |= words[word + 1] << (64 - offset);
    }
    value & mask(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty() {
        let ef = EliasFano::build(&[]);
        assert_eq!(ef.len(), 0);
        assert!(ef.is_empty());
        assert_eq!(ef.get(0), 0);
        assert_eq!(ef.iter().count(), 0);
    }

    #[test]
    fn test_single_element() {
        let ef = EliasFano::build(&[42]);
        assert_eq!(ef.len(), 1);
        assert_eq!(ef.get(0), 42);
        assert_eq!(ef.get(1), 0);
    }

    #[test]
    fn test_low_bits_choice() {
        // (1000 + 1) / 10 = 100 -> floor(log2(100)) = 6
        let values: Vec<u32> = (0..10).map(|i| i * 100 + 100).collect();
        let ef = EliasFano::build(&values);
        assert_eq!(ef.low_bits(), 6);

        // Dense sequence needs no low bits
        let dense: Vec<u32> = (0..100).collect();
        assert_eq!(EliasFano::build(&dense).low_bits(), 0);
    }

    #[test]
    fn test_cross_word_low_bits() {
        // l = 27 forces low-bit fields to straddle 64-bit words
        let values: Vec<u32> = (0..16).map(|i| i * 200_000_000).collect();
        let ef = EliasFano::build(&values);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(ef.get(i), v);
        }
        assert_eq!(ef.iter().collect::<Vec<_>>(), values);
    }

    #[test]
    fn test_duplicates_and_max() {
        let values = vec![0, 0, 7, 7, 7, u32::MAX, u32::MAX];
        let ef = EliasFano::build(&values);
        assert_eq!(ef.iter().collect::<Vec<_>>(), values);
        assert_eq!(ef.get(6), u32::MAX);
    }

    #[test]
    fn test_space_near_bound() {
        let values: Vec<u32> = (0..10_000).map(|i| i * 37).collect();
        let ef = EliasFano::build(&values);
        let per_element = ef.size_bits() as f64 / values.len() as f64;
        assert!(per_element <= (ef.low_bits() + 2) as f64 + 1.0, "{}", per_element);
    }

    #[test]
    fn test_serialization() {
        let values = vec![3, 9, 27, 81, 243, 729];
        let ef = EliasFano::build(&values);
        let mut buf = vec![0xAA];
        ef.write_to(&mut buf);
        assert_eq!(buf.len(), 1 + ef.serialized_len());

        let (decoded, consumed) = EliasFano::read_from(&buf[1..]).unwrap();
        assert_eq!(consumed, ef.serialized_len());
        assert_eq!(decoded, ef);
    }

    #[test]
    fn test_read_truncated() {
        let ef = EliasFano::build(&[1, 2, 3, 500]);
        let mut buf = Vec::new();
        ef.write_to(&mut buf);
        assert!(EliasFano::read_from(&buf[..buf.len() - 1]).is_none());
        assert!(EliasFano::read_from(&buf[..3]).is_none());
    }

    proptest! {
        #[test]
        fn get_reproduces_input(mut values in proptest::collection::vec(any::<u32>(), 0..300)) {
            values.sort_unstable();
            let ef = EliasFano::build(&values);
            prop_assert_eq!(ef.len(), values.len());
            for (i, &v) in values.iter().enumerate() {
                prop_assert_eq!(ef.get(i), v);
            }
            prop_assert_eq!(ef.iter().collect::<Vec<_>>(), values);
        }
    }
}
