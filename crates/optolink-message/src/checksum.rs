/// zlib-compatible CRC32 continued from `running`.
///
/// Start with `0`; folding `checksum(checksum(0, a), b)` gives the same
/// value as checksumming `a` and `b` concatenated.
pub fn checksum(running: u32, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(running);
    hasher.update(data);
    hasher.finalize()
}
