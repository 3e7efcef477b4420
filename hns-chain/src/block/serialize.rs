/// The maximum size of a block, in bytes.
///
/// This bounds the wire decoder, including the deferred `MemBlock` path.
pub const MAX_BLOCK_BYTES: u64 = 1_000_000;
