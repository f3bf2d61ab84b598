//! Chunked encrypt/decrypt transforms.
//!
//! Upload reads the source in `chunk_size` blocks and encrypts each one into
//! an independent frame of [`framed_len`]`(chunk_size)` bytes (the last frame
//! may be shorter). Download regroups the incoming bytes into frames of that
//! same length, whatever boundaries the transport delivered them with, and
//! decrypts them in order. Both sides must therefore agree on `chunk_size`.
//!
//! Each frame is sealed with [`frame_aad`] for its index and whether it is
//! the final one, so reordered, dropped or truncated frames fail with
//! [`SealError::Decryption`]. Both sides read one block ahead to know which
//! frame is final.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cipher::{Encryptor, frame_aad, framed_len};
use crate::error::{BoxError, Result, SealError};

/// Default plaintext chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Total encrypted size of a `plain_len` byte source sliced at `chunk_size`.
pub fn encrypted_len(plain_len: u64, chunk_size: usize) -> u64 {
    let chunk = chunk_size.max(1) as u64;
    let full = plain_len / chunk;
    let rem = plain_len % chunk;
    let mut total = full * framed_len(chunk_size.max(1)) as u64;
    if rem > 0 {
        total += framed_len(rem as usize) as u64;
    }
    total
}

/// Read until `buf` is full or the source hits EOF.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total_read = 0;
    while total_read < buf.len() {
        match reader.read(&mut buf[total_read..]) {
            Ok(0) => break,
            Ok(n) => total_read += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total_read)
}

async fn read_block_async<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut total_read = 0;
    while total_read < buf.len() {
        match reader.read(&mut buf[total_read..]).await? {
            0 => break,
            n => total_read += n,
        }
    }
    Ok(total_read)
}

/// Double buffer for one-block lookahead.
///
/// `cur` holds the block being processed and `ahead` the block read after
/// it, `ahead_len` bytes long, which becomes current on the next step.
struct Lookahead {
    cur: Vec<u8>,
    ahead: Vec<u8>,
    ahead_len: Option<usize>,
    done: bool,
}

impl Lookahead {
    fn new(block_len: usize) -> Self {
        Self {
            cur: vec![0u8; block_len],
            ahead: vec![0u8; block_len],
            ahead_len: None,
            done: false,
        }
    }

    /// Promote the lookahead block, if one was read.
    fn take_ahead(&mut self) -> Option<usize> {
        let m = self.ahead_len.take()?;
        std::mem::swap(&mut self.cur, &mut self.ahead);
        Some(m)
    }

    /// Record the outcome of one step. A full block followed by `ahead`
    /// more bytes is not final.
    fn step(&mut self, n: usize, ahead: Option<usize>) -> Option<(usize, bool)> {
        if n == 0 {
            self.done = true;
            return None;
        }
        let last = matches!(ahead, None | Some(0));
        self.ahead_len = ahead.filter(|&m| m > 0);
        self.done = last;
        Some((n, last))
    }

    fn block(&self, n: usize) -> &[u8] {
        &self.cur[..n]
    }
}

/// Seals or opens frames in file order.
struct FrameCounter {
    cipher: Arc<dyn Encryptor>,
    index: u64,
}

impl FrameCounter {
    fn new(cipher: Arc<dyn Encryptor>) -> Self {
        Self { cipher, index: 0 }
    }

    fn seal(&mut self, block: &[u8], last: bool) -> Result<Vec<u8>> {
        let frame = self
            .cipher
            .encrypt_with_aad(block, &frame_aad(self.index, last))?;
        self.index += 1;
        Ok(frame)
    }

    fn open(&mut self, frame: &[u8], last: bool) -> Result<Vec<u8>> {
        let plain = self
            .cipher
            .decrypt_with_aad(frame, &frame_aad(self.index, last))
            .map_err(|e| match e {
                SealError::Decryption(msg) => {
                    SealError::Decryption(format!("frame {}: {msg}", self.index))
                }
                other => other,
            })?;
        self.index += 1;
        Ok(plain)
    }
}

/// Pull the next block into `buf.cur`, returning its length and whether it
/// is the final one. `None` once the source is exhausted.
fn next_block<R: Read>(reader: &mut R, buf: &mut Lookahead) -> io::Result<Option<(usize, bool)>> {
    if buf.done {
        return Ok(None);
    }
    let n = match buf.take_ahead() {
        Some(n) => n,
        None => read_block(reader, &mut buf.cur)?,
    };
    let ahead = if n == buf.cur.len() {
        Some(read_block(reader, &mut buf.ahead)?)
    } else {
        None
    };
    Ok(buf.step(n, ahead))
}

async fn next_block_async<R>(
    reader: &mut R,
    buf: &mut Lookahead,
) -> io::Result<Option<(usize, bool)>>
where
    R: AsyncRead + Unpin,
{
    if buf.done {
        return Ok(None);
    }
    let n = match buf.take_ahead() {
        Some(n) => n,
        None => read_block_async(reader, &mut buf.cur).await?,
    };
    let ahead = if n == buf.cur.len() {
        Some(read_block_async(reader, &mut buf.ahead).await?)
    } else {
        None
    };
    Ok(buf.step(n, ahead))
}

/// Blocking encrypt slicer: a lazy, finite sequence of encrypted chunks.
pub struct EncryptSlicer<R> {
    reader: R,
    frames: FrameCounter,
    buf: Lookahead,
}

impl<R: Read> EncryptSlicer<R> {
    pub fn new(reader: R, cipher: Arc<dyn Encryptor>, chunk_size: usize) -> Self {
        Self {
            reader,
            frames: FrameCounter::new(cipher),
            buf: Lookahead::new(chunk_size.max(1)),
        }
    }

    /// Expose the encrypted sequence as a byte reader, e.g. for a streaming
    /// request body.
    pub fn into_reader(self) -> EncryptReader<R> {
        EncryptReader {
            slicer: self,
            frame: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: Read> Iterator for EncryptSlicer<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (n, last) = match next_block(&mut self.reader, &mut self.buf) {
            Ok(block) => block?,
            Err(e) => {
                self.buf.done = true;
                return Some(Err(e.into()));
            }
        };
        Some(self.frames.seal(self.buf.block(n), last))
    }
}

/// [`Read`] adapter over an [`EncryptSlicer`].
pub struct EncryptReader<R> {
    slicer: EncryptSlicer<R>,
    frame: Vec<u8>,
    pos: usize,
}

impl<R: Read> Read for EncryptReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.frame.len() {
            match self.slicer.next() {
                None => return Ok(0),
                Some(Ok(frame)) => {
                    self.frame = frame;
                    self.pos = 0;
                }
                Some(Err(SealError::Io(e))) => return Err(e),
                Some(Err(e)) => return Err(io::Error::other(e)),
            }
        }
        let n = out.len().min(self.frame.len() - self.pos);
        out[..n].copy_from_slice(&self.frame[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Async encrypt slicer state, driven by [`encrypt_stream`].
struct AsyncEncryptSlicer<R> {
    reader: R,
    frames: FrameCounter,
    buf: Lookahead,
}

impl<R: AsyncRead + Unpin> AsyncEncryptSlicer<R> {
    async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let Some((n, last)) = next_block_async(&mut self.reader, &mut self.buf).await? else {
            return Ok(None);
        };
        let frame = self.frames.seal(self.buf.block(n), last)?;
        Ok(Some(Bytes::from(frame)))
    }
}

/// Async encrypt slicer. Each source read is an await point.
pub fn encrypt_stream<R>(
    reader: R,
    cipher: Arc<dyn Encryptor>,
    chunk_size: usize,
) -> impl Stream<Item = Result<Bytes>> + Send + 'static
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let slicer = AsyncEncryptSlicer {
        reader,
        frames: FrameCounter::new(cipher),
        buf: Lookahead::new(chunk_size.max(1)),
    };
    futures::stream::try_unfold(slicer, |mut slicer| async move {
        let frame = slicer.next_frame().await?;
        Ok::<_, SealError>(frame.map(|f| (f, slicer)))
    })
}

/// Blocking decrypt slicer: yields the plaintext of each frame in order.
pub struct DecryptSlicer<R> {
    reader: R,
    frames: FrameCounter,
    buf: Lookahead,
}

impl<R: Read> DecryptSlicer<R> {
    /// `chunk_size` is the plaintext chunk size used at encryption time.
    pub fn new(reader: R, cipher: Arc<dyn Encryptor>, chunk_size: usize) -> Self {
        Self {
            reader,
            frames: FrameCounter::new(cipher),
            buf: Lookahead::new(framed_len(chunk_size.max(1))),
        }
    }

    /// Decrypt everything into `writer`. Returns the plaintext byte count.
    pub fn write_to<W: Write>(self, writer: &mut W) -> Result<u64> {
        let mut written = 0u64;
        for chunk in self {
            let chunk = chunk?;
            writer.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        writer.flush()?;
        Ok(written)
    }
}

impl<R: Read> Iterator for DecryptSlicer<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let (n, last) = match next_block(&mut self.reader, &mut self.buf) {
            Ok(block) => block?,
            Err(e) => {
                self.buf.done = true;
                return Some(Err(e.into()));
            }
        };
        let plain = self.frames.open(self.buf.block(n), last);
        if plain.is_err() {
            self.buf.done = true;
        }
        Some(plain)
    }
}

/// Push-based frame decoder for transport-driven chunk streams.
///
/// A complete frame is held back until more bytes arrive, since only then
/// is it known not to be the final one.
pub struct ChunkDecryptor {
    frames: FrameCounter,
    frame_len: usize,
    pending: Vec<u8>,
}

impl ChunkDecryptor {
    /// `chunk_size` is the plaintext chunk size used at encryption time.
    pub fn new(cipher: Arc<dyn Encryptor>, chunk_size: usize) -> Self {
        let frame_len = framed_len(chunk_size.max(1));
        Self {
            frames: FrameCounter::new(cipher),
            frame_len,
            pending: Vec::with_capacity(2 * frame_len),
        }
    }

    /// Buffer `data` and return the plaintext of every frame it shows to be
    /// followed by another.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.pending.extend_from_slice(data);
        let mut out = Vec::new();
        let mut offset = 0;
        while self.pending.len() - offset > self.frame_len {
            let frame = &self.pending[offset..offset + self.frame_len];
            out.extend_from_slice(&self.frames.open(frame, false)?);
            offset += self.frame_len;
        }
        self.pending.drain(..offset);
        Ok(out)
    }

    /// Decrypt the final frame. An empty stream is an empty file.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        self.frames.open(&self.pending, true)
    }
}

/// Decrypt a transport byte stream into `writer`. Returns the plaintext
/// byte count.
pub async fn decrypt_stream_to<S, E, W>(
    mut stream: S,
    writer: &mut W,
    cipher: Arc<dyn Encryptor>,
    chunk_size: usize,
) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Into<BoxError>,
    W: AsyncWrite + Unpin,
{
    let mut decryptor = ChunkDecryptor::new(cipher, chunk_size);
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(SealError::transport)?;
        let plain = decryptor.push(&chunk)?;
        if !plain.is_empty() {
            writer.write_all(&plain).await?;
            written += plain.len() as u64;
        }
    }
    let tail = decryptor.finish()?;
    writer.write_all(&tail).await?;
    writer.flush().await?;
    written += tail.len() as u64;
    Ok(written)
}
