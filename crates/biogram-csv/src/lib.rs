//! Streaming reader for the record CSV format.
//!
//! One record per line: `uint64-id "," bool "," bool "," text "\n"`. The text
//! field is empty, raw (no embedded newline), or double-quoted with `""` as an
//! escaped quote (and may then contain embedded newlines).
//!
//! The reader pulls fixed-size blocks from a [`ByteSource`] into an internal
//! buffer and never buffers the whole file. Every field has a hard byte bound
//! derived from [`MAX_TEXT_BYTES`], so no allocation grows with input size.
//! Clean end-of-stream is `Ok(None)` from [`RecordReader::next_record`]; a
//! refill that comes up empty mid-field is reported as the error of the field
//! being read (`ExpectedNewline`, `ExpectedEndQuote`, ...), never as success.
//!
//! Errors are terminal for the current record and the stream position is not
//! rewound. Callers that want to keep going use [`RecordReader::skip_record`]
//! to resync at the next newline.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use memmap2::Mmap;
use thiserror::Error;

use biogram_types::{MAX_TEXT_BYTES, Record};

/// Rough scale of one line: maximum unquoted text plus short leading fields.
/// A long id or quote escaping can exceed it; nothing requires a line to fit
/// in the buffer, so this only sizes [`BUFFER_SIZE`].
pub const MAX_LINE_BYTES: usize = MAX_TEXT_BYTES + 6;
/// Internal block size for [`ByteSource`] reads. Tuning only: refills happen
/// mid-field whenever a line straddles two blocks.
pub const BUFFER_SIZE: usize = MAX_LINE_BYTES * 20;

/// Something that yields bytes. `Ok(0)` means end of stream; an `Err` is an
/// I/O failure and aborts the read, it is never folded into a parse result.
pub trait ByteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl ByteSource for Box<dyn ByteSource> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// In-memory source, used by tests and by the mmap path.
pub struct SliceSource<T: AsRef<[u8]>> {
    data: T,
    pos: usize,
}

impl<T: AsRef<[u8]>> SliceSource<T> {
    pub fn new(data: T) -> Self {
        Self { data, pos: 0 }
    }
}

impl<T: AsRef<[u8]>> ByteSource for SliceSource<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.as_ref();
        let n = buf.len().min(data.len() - self.pos);
        buf[..n].copy_from_slice(&data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Plain buffered file reads.
pub struct FileSource {
    file: File,
}

impl FileSource {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl ByteSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// How to back the input file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadMode {
    /// Memory-map the file and stream out of the mapping.
    Mmap,
    /// Ordinary `read()` calls.
    Stream,
}

/// Open `path` as a record stream with the chosen backing.
pub fn open(path: impl AsRef<Path>, mode: ReadMode) -> Result<RecordReader<Box<dyn ByteSource>>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let source: Box<dyn ByteSource> = match mode {
        ReadMode::Mmap => {
            let map = unsafe { Mmap::map(&file) }
                .with_context(|| format!("memory-mapping {}", path.display()))?;
            Box::new(SliceSource::new(map))
        }
        ReadMode::Stream => Box::new(FileSource::new(file)),
    };
    Ok(RecordReader::new(source))
}

/// What went wrong with the record being parsed. All variants are terminal
/// for that record.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("error reading input: {0}")]
    Io(#[from] io::Error),
    #[error("expected a uint64")]
    ExpectedUint64,
    #[error("integer exceeded the uint64 range")]
    Uint64OutOfRange,
    #[error("expected ','")]
    ExpectedComma,
    #[error("expected '0' or '1'")]
    Expected0Or1,
    #[error("expected '\\n'")]
    ExpectedNewline,
    #[error("expected '\"'")]
    ExpectedEndQuote,
}

/// Streaming record parser over any [`ByteSource`].
pub struct RecordReader<S: ByteSource> {
    source: S,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
}

impl<S: ByteSource> RecordReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            end: 0,
        }
    }

    /// Parse the next record. `Ok(None)` at clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<Record>, ReadError> {
        if self.buffered() == 0 {
            self.refill()?;
            if self.buffered() == 0 {
                return Ok(None);
            }
        }

        let id = self.read_u64_and_comma()?;

        let flag_a = self.read_bool()?;
        self.consume_comma()?;

        let flag_b = self.read_bool()?;
        self.consume_comma()?;

        let mut text = [0u8; MAX_TEXT_BYTES];
        let len = self.read_text(&mut text)?;

        self.consume_newline()?;

        Ok(Some(Record {
            id,
            flag_a,
            flag_b,
            text: text[..len].to_vec(),
        }))
    }

    /// Resync after a parse error by consuming through the next newline.
    ///
    /// Returns `Ok(false)` when the stream ended before a newline was found.
    /// Best-effort: a malformed quoted field with embedded newlines resyncs
    /// at its first newline, which may sacrifice the following line too.
    pub fn skip_record(&mut self) -> Result<bool, ReadError> {
        loop {
            if self.buffered() == 0 {
                self.refill()?;
                if self.buffered() == 0 {
                    return Ok(false);
                }
            }
            match find_byte(&self.buf[self.pos..self.end], b'\n') {
                Some(i) => {
                    self.pos += i + 1;
                    return Ok(true);
                }
                None => self.pos = self.end,
            }
        }
    }

    fn buffered(&self) -> usize {
        self.end - self.pos
    }

    fn refill(&mut self) -> Result<(), ReadError> {
        let n = self.source.read(&mut self.buf)?;
        self.pos = 0;
        self.end = n;
        Ok(())
    }

    /// Refill when empty; report `err` if the source is exhausted.
    fn fill_or(&mut self, err: ReadError) -> Result<(), ReadError> {
        if self.buffered() == 0 {
            self.refill()?;
            if self.buffered() == 0 {
                return Err(err);
            }
        }
        Ok(())
    }

    fn take_byte(&mut self) -> u8 {
        let b = self.buf[self.pos];
        self.pos += 1;
        b
    }

    /// Absorb `[1-9][0-9]*,` and return the integer.
    fn read_u64_and_comma(&mut self) -> Result<u64, ReadError> {
        let mut value: u64 = 0;
        let mut digits = 0usize;

        loop {
            self.fill_or(if digits == 0 {
                ReadError::ExpectedUint64
            } else {
                ReadError::ExpectedComma
            })?;

            match self.take_byte() {
                b',' => {
                    if digits == 0 {
                        return Err(ReadError::ExpectedUint64);
                    }
                    return Ok(value);
                }
                b @ b'0'..=b'9' => {
                    // A leading zero also catches a literal id of 0, which is
                    // invalid input.
                    if value == 0 && b == b'0' {
                        return Err(ReadError::ExpectedUint64);
                    }
                    value = value
                        .checked_mul(10)
                        .and_then(|v| v.checked_add(u64::from(b - b'0')))
                        .ok_or(ReadError::Uint64OutOfRange)?;
                    digits += 1;
                }
                _ => return Err(ReadError::ExpectedComma),
            }
        }
    }

    fn read_bool(&mut self) -> Result<bool, ReadError> {
        self.fill_or(ReadError::Expected0Or1)?;
        match self.take_byte() {
            b'0' => Ok(false),
            b'1' => Ok(true),
            _ => Err(ReadError::Expected0Or1),
        }
    }

    fn consume_comma(&mut self) -> Result<(), ReadError> {
        self.fill_or(ReadError::ExpectedComma)?;
        if self.take_byte() != b',' {
            return Err(ReadError::ExpectedComma);
        }
        Ok(())
    }

    fn consume_newline(&mut self) -> Result<(), ReadError> {
        self.fill_or(ReadError::ExpectedNewline)?;
        if self.take_byte() != b'\n' {
            return Err(ReadError::ExpectedNewline);
        }
        Ok(())
    }

    /// Fill `out` with the text field. Leaves the terminating newline (or the
    /// byte after the closing quote) unconsumed for [`Self::consume_newline`].
    fn read_text(&mut self, out: &mut [u8]) -> Result<usize, ReadError> {
        self.fill_or(ReadError::ExpectedNewline)?;
        match self.buf[self.pos] {
            b'\n' => Ok(0),
            b'"' => self.read_quoted_text(out),
            _ => self.read_unquoted_text(out),
        }
    }

    /// Raw bytes up to the next newline.
    fn read_unquoted_text(&mut self, out: &mut [u8]) -> Result<usize, ReadError> {
        let max = out.len();
        let mut copied = 0usize;

        while copied < max {
            let avail = self.buffered().min(max - copied);
            let chunk = &self.buf[self.pos..self.pos + avail];

            if let Some(i) = find_byte(chunk, b'\n') {
                out[copied..copied + i].copy_from_slice(&chunk[..i]);
                self.pos += i;
                return Ok(copied + i);
            }

            out[copied..copied + avail].copy_from_slice(chunk);
            copied += avail;
            self.pos += avail;
            self.fill_or(ReadError::ExpectedNewline)?;
        }

        // Copied the maximum; only a newline right here makes it well-formed.
        if self.buf[self.pos] == b'\n' {
            return Ok(max);
        }
        Err(ReadError::ExpectedNewline)
    }

    /// Quoted text: starts at an opening `"`, ends at the first `"` not
    /// followed by another `"`; `""` is written out as one literal quote.
    fn read_quoted_text(&mut self, out: &mut [u8]) -> Result<usize, ReadError> {
        self.pos += 1; // opening quote
        self.fill_or(ReadError::ExpectedEndQuote)?;

        let max = out.len();
        let mut copied = 0usize;

        while copied < max {
            let avail = self.buffered().min(max - copied);
            let chunk = &self.buf[self.pos..self.pos + avail];

            match find_byte(chunk, b'"') {
                Some(i) => {
                    out[copied..copied + i].copy_from_slice(&chunk[..i]);
                    copied += i;
                    self.pos += i + 1; // consume the quote without emitting it

                    self.fill_or(ReadError::ExpectedNewline)?;
                    if self.buf[self.pos] == b'"' {
                        // Escaped quote: emit one and keep scanning.
                        if copied == max {
                            return Err(ReadError::ExpectedEndQuote);
                        }
                        out[copied] = b'"';
                        copied += 1;
                        self.pos += 1;
                        self.fill_or(ReadError::ExpectedEndQuote)?;
                    } else {
                        return Ok(copied);
                    }
                }
                None => {
                    out[copied..copied + avail].copy_from_slice(chunk);
                    copied += avail;
                    self.pos += avail;
                    self.fill_or(ReadError::ExpectedEndQuote)?;
                }
            }
        }

        // Copied the maximum; only an immediate unescaped closing quote makes
        // it well-formed.
        if self.buf[self.pos] == b'"' {
            self.pos += 1;
            self.fill_or(ReadError::ExpectedNewline)?;
            if self.buf[self.pos] == b'"' {
                return Err(ReadError::ExpectedEndQuote);
            }
            return Ok(max);
        }
        Err(ReadError::ExpectedEndQuote)
    }
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}
