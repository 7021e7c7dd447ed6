//! Chunked I/O
//!
//! Fixed-size chunk reading shared by uploads and downloads. Every chunk is
//! filled completely unless the source reaches EOF, so peak memory per
//! operation is one chunk and a source whose length is an exact multiple of
//! the chunk size never yields a trailing empty chunk.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use futures::stream;
use std::io;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Chunk size for reads and writes (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Totals reported by [`copy_chunked`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub bytes: u64,
    pub chunks: usize,
}

/// Fills `buf` from `reader`, returning fewer bytes than `buf.len()` only at EOF.
pub async fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Copies `reader` into `writer` one chunk at a time.
///
/// Each chunk is written before the next one is read.
pub async fn copy_chunked<R, W>(reader: &mut R, writer: &mut W) -> io::Result<CopyStats>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut stats = CopyStats::default();

    loop {
        let n = read_chunk(reader, &mut buf).await?;
        if n == 0 {
            break;
        }

        writer.write_all(&buf[..n]).await?;
        stats.bytes += n as u64;
        stats.chunks += 1;

        // A short chunk means the source is exhausted
        if n < CHUNK_SIZE {
            break;
        }
    }

    Ok(stats)
}

enum ChunkState {
    Unopened(PathBuf),
    Reading(File),
    Done,
}

/// Lazily streams the file at `path` in [`CHUNK_SIZE`] pieces.
///
/// The file is opened on the first poll. The stream owns the handle, so it is
/// closed when the stream finishes, fails, or is dropped half-way.
pub fn file_chunks(path: PathBuf) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    stream::try_unfold(ChunkState::Unopened(path), next_chunk)
}

async fn next_chunk(state: ChunkState) -> io::Result<Option<(Bytes, ChunkState)>> {
    let mut file = match state {
        ChunkState::Unopened(path) => File::open(&path).await?,
        ChunkState::Reading(file) => file,
        ChunkState::Done => return Ok(None),
    };

    let mut buf = BytesMut::zeroed(CHUNK_SIZE);
    let n = read_chunk(&mut file, &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);

    let next = if n < CHUNK_SIZE {
        ChunkState::Done
    } else {
        ChunkState::Reading(file)
    };

    Ok(Some((buf.freeze(), next)))
}
