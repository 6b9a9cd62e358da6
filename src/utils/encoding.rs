//! Bounds-checked little-endian reads for segment, codec and wire buffers

/// Read a little-endian u32 at `offset`, or None if it would run past the end
#[inline]
pub fn u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

/// Read a little-endian u64 at `offset`, or None if it would run past the end
#[inline]
pub fn u64_at(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset.checked_add(8)?)?;
    Some(u64::from_le_bytes(bytes.try_into().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_at_offsets() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        buf.extend_from_slice(&(u64::MAX - 1).to_le_bytes());

        assert_eq!(u32_at(&buf, 0), Some(0xDEAD_BEEF));
        assert_eq!(u64_at(&buf, 4), Some(u64::MAX - 1));
        assert_eq!(u32_at(&buf, 9), None);
    }

    #[test]
    fn test_slice_reads_out_of_bounds() {
        let buf = [1u8, 2, 3];
        assert_eq!(u32_at(&buf, 0), None);
        assert_eq!(u64_at(&buf, usize::MAX), None);
    }
}
