// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::{ByteCursor, Error};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A cursor that pulls bytes from a [`Read`] source in chunks.
///
/// Only a window of the input is kept in memory. Bytes before the cursor
/// position are discarded whenever the window is refilled.
pub struct StreamCursor<R> {
    source: R,
    /// Buffered window of the input. `window[start..]` are the bytes not yet
    /// consumed.
    window: Vec<u8>,
    start: usize,
    /// Absolute offset of `window[0]`.
    window_offset: usize,
    chunk_size: usize,
    eof: bool,
}

impl StreamCursor<File> {
    /// Opens the file at `path` for chunked reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> StreamCursor<R> {
    pub fn new(source: R) -> Self {
        Self::with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            window: Vec::new(),
            start: 0,
            window_offset: 0,
            chunk_size: chunk_size.max(1),
            eof: false,
        }
    }

    fn available(&self) -> usize {
        self.window.len() - self.start
    }

    /// Makes sure at least `count` unconsumed bytes are buffered, unless the
    /// source runs dry first. Returns whether the request could be satisfied.
    fn fill(&mut self, count: usize) -> crate::Result<bool> {
        if self.available() >= count {
            return Ok(true);
        }

        // drop the already consumed prefix before growing the window
        if self.start > 0 {
            self.window.drain(..self.start);
            self.window_offset += self.start;
            self.start = 0;
        }

        // the window grows by at most one chunk per read
        while !self.eof && self.window.len() < count {
            let filled = self.window.len();
            self.window.resize(filled + self.chunk_size, 0);

            let read = loop {
                match self.source.read(&mut self.window[filled..]) {
                    Ok(read) => break read,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        self.window.truncate(filled);
                        return Err(Error::Io(err));
                    }
                }
            };

            self.window.truncate(filled + read);
            if read == 0 {
                log::trace!("stream source exhausted at offset {:#x}", self.window_offset + filled);
                self.eof = true;
            }
        }

        Ok(self.window.len() >= count)
    }
}

impl<R: Read> ByteCursor for StreamCursor<R> {
    fn position(&self) -> usize {
        self.window_offset + self.start
    }

    fn peek(&mut self) -> crate::Result<Option<u8>> {
        if self.fill(1)? {
            Ok(Some(self.window[self.start]))
        } else {
            Ok(None)
        }
    }

    fn consume_any(&mut self) -> crate::Result<u8> {
        let byte = self.peek()?.ok_or(Error::UnexpectedEnd {
            position: self.position(),
            expected: None,
        })?;
        self.start += 1;
        Ok(byte)
    }

    fn consume_n(&mut self, count: usize) -> crate::Result<&[u8]> {
        if !self.fill(count)? {
            return Err(Error::UnexpectedEnd {
                position: self.position(),
                expected: None,
            });
        }

        let bytes = &self.window[self.start..self.start + count];
        self.start += count;
        Ok(bytes)
    }
}
