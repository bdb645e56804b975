//! Read a finished fetch job's in-memory response back into one buffer.

use std::io;

/// Chunk size used when draining a response sink.
pub const DRAIN_CHUNK_SIZE: usize = 2048;

/// Positional reads from a byte sink. A read of zero bytes means end of data.
pub trait ReadAt {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

/// Read `source` from offset zero in fixed-size chunks until a read returns
/// zero bytes, concatenating everything in order. The total size is never
/// asked for up front.
pub fn drain_response<R: ReadAt + ?Sized>(source: &R) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut chunk = [0u8; DRAIN_CHUNK_SIZE];
    loop {
        let n = source.read_at(&mut chunk, body.len() as u64)?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n.min(chunk.len())]);
    }
    Ok(body)
}
