//! Streaming source/sink for blob uploads and downloads.
//!
//! # Design
//! A `TransferHandle` is opened eagerly by its factory and owned by exactly
//! one call. Uploads pull bytes through [`TransferHandle::read_chunk`] (also
//! exposed as `std::io::Read`), downloads push bytes through
//! [`TransferHandle::write_chunk`]. The underlying stream is released by
//! [`TransferHandle::close`] or, failing that, on drop, so an error anywhere
//! in the call never leaks a descriptor.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, VaultError};
use crate::http::is_octet_stream;

/// Direction the handle is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Read,
    Write,
}

/// Where transfer bytes come from or go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferTarget {
    Path(PathBuf),
    /// An `http://` or `https://` resource, readable only.
    Url(String),
}

impl From<&str> for TransferTarget {
    fn from(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            TransferTarget::Url(value.to_string())
        } else {
            TransferTarget::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for TransferTarget {
    fn from(value: String) -> Self {
        TransferTarget::from(value.as_str())
    }
}

impl From<&Path> for TransferTarget {
    fn from(value: &Path) -> Self {
        TransferTarget::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for TransferTarget {
    fn from(value: PathBuf) -> Self {
        TransferTarget::Path(value)
    }
}

trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

enum Stream {
    Seekable(Box<dyn ReadSeek>),
    Reader(Box<dyn Read + Send>),
    Writer(Box<dyn Write + Send>),
}

pub struct TransferHandle {
    name: String,
    stream: Option<Stream>,
    /// Header-style metadata (`Content-Length` and friends) for streams
    /// that cannot seek.
    metadata: Vec<(String, String)>,
}

impl TransferHandle {
    /// Open `target` immediately in the given mode.
    pub fn open(target: impl Into<TransferTarget>, mode: TransferMode) -> Result<Self> {
        match (target.into(), mode) {
            (TransferTarget::Path(path), TransferMode::Read) => {
                let file = File::open(&path).map_err(|e| access_error(&path.display(), e))?;
                Ok(Self::with_stream(
                    path.display().to_string(),
                    Stream::Seekable(Box::new(file)),
                    Vec::new(),
                ))
            }
            (TransferTarget::Path(path), TransferMode::Write) => {
                let file = File::create(&path).map_err(|e| access_error(&path.display(), e))?;
                Ok(Self::with_stream(
                    path.display().to_string(),
                    Stream::Writer(Box::new(file)),
                    Vec::new(),
                ))
            }
            (TransferTarget::Url(url), TransferMode::Read) => open_url(url),
            (TransferTarget::Url(url), TransferMode::Write) => {
                debug!(%url, "refusing to open remote resource for writing");
                Err(VaultError::file("Unable to access file"))
            }
        }
    }

    /// Wrap a seekable in-memory or custom source.
    pub fn from_seekable<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: Read + Seek + Send + 'static,
    {
        Self::with_stream(name.into(), Stream::Seekable(Box::new(reader)), Vec::new())
    }

    /// Wrap a forward-only source. Its size can only come from a
    /// `Content-Length` entry in `metadata`.
    pub fn from_reader<R>(name: impl Into<String>, reader: R, metadata: Vec<(String, String)>) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::with_stream(name.into(), Stream::Reader(Box::new(reader)), metadata)
    }

    /// Wrap a forward-only source whose length is known up front.
    pub fn from_reader_with_length<R>(name: impl Into<String>, reader: R, length: u64) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::from_reader(
            name,
            reader,
            vec![("Content-Length".to_string(), length.to_string())],
        )
    }

    /// Wrap a destination sink for downloads.
    pub fn from_writer<W>(name: impl Into<String>, writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::with_stream(name.into(), Stream::Writer(Box::new(writer)), Vec::new())
    }

    fn with_stream(name: String, stream: Stream, metadata: Vec<(String, String)>) -> Self {
        debug!(%name, "transfer handle opened");
        Self {
            name,
            stream: Some(stream),
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of bytes an upload from this handle will send.
    ///
    /// Seekable sources are measured by seeking to the end and back to the
    /// current offset. Other sources fall back to a `Content-Length`
    /// metadata entry. Anything else is an error.
    pub fn size(&mut self) -> Result<u64> {
        match self.stream.as_mut() {
            Some(Stream::Seekable(stream)) => {
                let measure = |stream: &mut Box<dyn ReadSeek>| -> io::Result<u64> {
                    let offset = stream.stream_position()?;
                    let end = stream.seek(SeekFrom::End(0))?;
                    stream.seek(SeekFrom::Start(offset))?;
                    Ok(end.saturating_sub(offset))
                };
                measure(stream).map_err(|_| size_error())
            }
            Some(Stream::Reader(_)) => self
                .metadata
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<u64>().ok())
                .ok_or_else(size_error),
            Some(Stream::Writer(_)) | None => Err(size_error()),
        }
    }

    /// Read up to `buf.len()` bytes for an upload. May return fewer bytes
    /// than requested; zero means the source is exhausted.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = match self.stream.as_mut() {
            Some(Stream::Seekable(stream)) => stream.read(buf)?,
            Some(Stream::Reader(stream)) => stream.read(buf)?,
            Some(Stream::Writer(_)) | None => {
                return Err(VaultError::file("Unable to read from file"))
            }
        };
        Ok(read)
    }

    /// Append a chunk of a download to the sink.
    ///
    /// Rejects the bytes unless the response being written is an octet
    /// stream, so an error page never lands in the destination.
    pub fn write_chunk(&mut self, content_type: &str, data: &[u8]) -> Result<usize> {
        if !is_octet_stream(content_type) {
            return Err(VaultError::file("Unable to retrieve file"));
        }
        match self.stream.as_mut() {
            Some(Stream::Writer(sink)) => {
                sink.write_all(data)?;
                Ok(data.len())
            }
            _ => Err(VaultError::file("Unable to write to file")),
        }
    }

    /// Flush and release the stream.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(Stream::Writer(mut sink)) => {
                debug!(name = %self.name, "transfer handle closed");
                sink.flush()?;
                Ok(())
            }
            Some(_) => {
                debug!(name = %self.name, "transfer handle closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Read for TransferHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stream = match &self.stream {
            Some(Stream::Seekable(_)) => "seekable",
            Some(Stream::Reader(_)) => "reader",
            Some(Stream::Writer(_)) => "writer",
            None => "closed",
        };
        f.debug_struct("TransferHandle")
            .field("name", &self.name)
            .field("stream", &stream)
            .field("metadata", &self.metadata)
            .finish()
    }
}

fn open_url(url: String) -> Result<TransferHandle> {
    let response = ureq::get(&url).call().map_err(|e| {
        debug!(%url, error = %e, "unable to open remote resource");
        VaultError::file("Unable to access file")
    })?;
    let metadata = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let reader = response.into_body().into_reader();
    Ok(TransferHandle::with_stream(
        url,
        Stream::Reader(Box::new(reader)),
        metadata,
    ))
}

fn access_error(name: &dyn fmt::Display, error: io::Error) -> VaultError {
    debug!(%name, %error, "unable to open transfer target");
    VaultError::file("Unable to access file")
}

fn size_error() -> VaultError {
    VaultError::file("Unable to retrieve file size")
}
