//! Gzip codec for frame files.
//!
//! Frames are compressed on the way to disk and decompressed on the way out;
//! callers of the store only ever see plain text. The codec works on bytes
//! and has no notion of text encoding beyond validating UTF-8 on decode.
//!
//! Output is deterministic: the gzip header is written with mtime 0 and no
//! file name, so equal input at equal level yields identical bytes.

use std::io::{self, Read, Write};

use flate2::bufread::GzDecoder;
use flate2::{Compression, GzBuilder};
use thiserror::Error;

/// 10 byte header + 8 byte CRC32/ISIZE trailer.
const MIN_GZIP_LEN: usize = 18;

/// Default gzip level, matches zlib's default.
pub const DEFAULT_LEVEL: u32 = 6;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to compress frame: {0}")]
    Compress(#[source] io::Error),

    #[error("stream too short to be gzip ({0} bytes)")]
    Truncated(usize),

    #[error("invalid gzip stream: {0}")]
    Decompress(#[source] io::Error),

    #[error("{0} unexpected bytes after the gzip stream")]
    TrailingData(usize),

    #[error("decompressed frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Compresses and decompresses frame bytes.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    level: Compression,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl Codec {
    /// Levels above 9 are clamped.
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }

    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzBuilder::new()
            .mtime(0)
            .write(Vec::with_capacity(data.len() / 2 + MIN_GZIP_LEN), self.level);
        encoder.write_all(data).map_err(CodecError::Compress)?;
        encoder.finish().map_err(CodecError::Compress)
    }

    pub fn decompress(&self, data: &[u8]) -> Result<String, CodecError> {
        if data.len() < MIN_GZIP_LEN {
            return Err(CodecError::Truncated(data.len()));
        }

        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::with_capacity(data.len() * 2);
        decoder
            .read_to_end(&mut out)
            .map_err(CodecError::Decompress)?;

        // compress() writes exactly one member; anything after it is damage.
        let rest = decoder.into_inner();
        if !rest.is_empty() {
            return Err(CodecError::TrailingData(rest.len()));
        }

        Ok(String::from_utf8(out)?)
    }
}
