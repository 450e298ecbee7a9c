//! Range-addressable async byte sources, plus chunking and caching middleware.
//!
//! The caching middleware follows `martin-core`'s `tiles::cache` (`moka::future::Cache`-based
//! tile cache); the transport legs (`HttpByteSource`, `FileByteSource`) draw on `martin-core`'s
//! use of async I/O for remote sources, since the reference COG reader in this workspace reads
//! synchronously from a local file only.

use std::ops::Range;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

use crate::error::{CogError, Result};

/// A range-addressable byte source. Implementations must return exactly `length` bytes or an
/// error; a short read from the underlying transport is `CogError::ShortRead`, never silently
/// truncated.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch(&self, offset: u64, length: u64) -> Result<Bytes>;

    /// Total length of the addressable byte range, if known up front.
    async fn len(&self) -> Result<u64>;
}

pub struct FileByteSource {
    path: PathBuf,
}

impl FileByteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileByteSource { path: path.into() }
    }
}

#[async_trait]
impl ByteSource for FileByteSource {
    async fn fetch(&self, offset: u64, length: u64) -> Result<Bytes> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; length as usize];
        let mut read = 0usize;
        while read < buf.len() {
            let n = file.read(&mut buf[read..]).await?;
            if n == 0 {
                return Err(CogError::ShortRead { wanted: length, got: read as u64 });
            }
            read += n;
        }
        Ok(Bytes::from(buf))
    }

    async fn len(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

pub struct MemoryByteSource {
    data: Bytes,
}

impl MemoryByteSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        MemoryByteSource { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemoryByteSource {
    async fn fetch(&self, offset: u64, length: u64) -> Result<Bytes> {
        let start = offset as usize;
        let end = start + length as usize;
        if end > self.data.len() {
            return Err(CogError::ShortRead {
                wanted: length,
                got: self.data.len().saturating_sub(start) as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }
}

pub struct HttpByteSource {
    client: reqwest::Client,
    url: String,
}

impl HttpByteSource {
    pub fn new(url: impl Into<String>) -> Self {
        HttpByteSource { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn fetch(&self, offset: u64, length: u64) -> Result<Bytes> {
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, range)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;
        if (body.len() as u64) < length {
            return Err(CogError::ShortRead { wanted: length, got: body.len() as u64 });
        }
        Ok(body)
    }

    async fn len(&self) -> Result<u64> {
        let response = self.client.head(&self.url).send().await?.error_for_status()?;
        response
            .content_length()
            .ok_or_else(|| CogError::InvalidTiff { reason: "server did not report Content-Length".into() })
    }
}

const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024;
const DEFAULT_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

/// Rounds every request up to the enclosing `chunk_size` boundary before delegating, so several
/// small reads within one chunk collapse into a single upstream fetch.
pub struct ChunkedByteSource<S> {
    inner: S,
    chunk_size: u64,
}

impl<S: ByteSource> ChunkedByteSource<S> {
    pub fn new(inner: S, chunk_size: u64) -> Self {
        ChunkedByteSource { inner, chunk_size: chunk_size.max(1) }
    }

    fn chunk_range(&self, offset: u64, length: u64) -> (u64, Range<usize>) {
        let first_chunk = offset / self.chunk_size;
        let last_chunk = (offset + length - 1) / self.chunk_size;
        let chunk_start = first_chunk * self.chunk_size;
        let span = (last_chunk - first_chunk + 1) * self.chunk_size;
        let local_start = (offset - chunk_start) as usize;
        let local_end = local_start + length as usize;
        (span, local_start..local_end)
    }
}

#[async_trait]
impl<S: ByteSource> ByteSource for ChunkedByteSource<S> {
    async fn fetch(&self, offset: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let total_len = self.inner.len().await?;
        let (span, local) = self.chunk_range(offset, length);
        let chunk_start = offset - local.start as u64;
        let clamped_span = span.min(total_len.saturating_sub(chunk_start));
        let data = self.inner.fetch(chunk_start, clamped_span).await?;
        Ok(data.slice(local))
    }

    async fn len(&self) -> Result<u64> {
        self.inner.len().await
    }
}

/// LRU byte-range cache in front of a `ChunkedByteSource`, keyed by chunk index. Grounded on
/// `martin-core::tiles::cache`'s `moka::future::Cache` usage.
pub struct CachedByteSource<S> {
    inner: ChunkedByteSource<S>,
    cache: moka::future::Cache<u64, Bytes>,
    chunk_size: u64,
}

impl<S: ByteSource> CachedByteSource<S> {
    pub fn new(inner: S, chunk_size: u64, cache_size_bytes: u64) -> Self {
        let chunk_size = chunk_size.max(1);
        let cache = moka::future::Cache::builder()
            .weigher(|_key: &u64, value: &Bytes| value.len() as u32)
            .max_capacity(cache_size_bytes)
            .build();
        CachedByteSource { inner: ChunkedByteSource::new(inner, chunk_size), cache, chunk_size }
    }

    pub fn with_defaults(inner: S) -> Self {
        Self::new(inner, DEFAULT_CHUNK_SIZE, DEFAULT_CACHE_SIZE)
    }
}

#[async_trait]
impl<S: ByteSource> ByteSource for CachedByteSource<S> {
    async fn fetch(&self, offset: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let first_chunk = offset / self.chunk_size;
        let last_chunk = (offset + length - 1) / self.chunk_size;

        if first_chunk == last_chunk {
            let chunk_start = first_chunk * self.chunk_size;
            let data = self
                .cache
                .try_get_with(first_chunk, async { self.inner.inner.fetch(chunk_start, self.chunk_size).await })
                .await
                .map_err(|e: Arc<CogError>| CogError::InvalidTiff { reason: e.to_string() })?;
            let local_start = (offset - chunk_start) as usize;
            let local_end = local_start + length as usize;
            if local_end > data.len() {
                return Err(CogError::ShortRead { wanted: length, got: data.len().saturating_sub(local_start) as u64 });
            }
            return Ok(data.slice(local_start..local_end));
        }

        // Spans a chunk boundary: bypass the cache for this one request. Chunking is an
        // optimisation, not a correctness requirement.
        self.inner.fetch(offset, length).await
    }

    async fn len(&self) -> Result<u64> {
        self.inner.len().await
    }
}

/// Checks a cancellation token at a suspension-point boundary.
pub(crate) fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    if let Some(token) = token {
        if token.is_cancelled() {
            return Err(CogError::Aborted);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_rejects_short_reads() {
        let source = MemoryByteSource::new(Bytes::from_static(b"0123456789"));
        assert_eq!(source.fetch(0, 10).await.unwrap().as_ref(), b"0123456789");
        assert!(source.fetch(5, 10).await.is_err());
    }

    #[tokio::test]
    async fn chunked_source_rounds_to_chunk_boundary() {
        let source = MemoryByteSource::new(Bytes::from(vec![0u8; 100]));
        let chunked = ChunkedByteSource::new(source, 16);
        let data = chunked.fetch(10, 5).await.unwrap();
        assert_eq!(data.len(), 5);
    }

    #[tokio::test]
    async fn cached_source_returns_identical_bytes_across_hits() {
        let source = MemoryByteSource::new(Bytes::from((0u8..=255).collect::<Vec<_>>()));
        let cached = CachedByteSource::new(source, 16, 4096);
        let a = cached.fetch(3, 10).await.unwrap();
        let b = cached.fetch(3, 10).await.unwrap();
        assert_eq!(a, b);
    }
}
