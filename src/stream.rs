use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::mem;

use crate::error::{LispError, LispResult};
use crate::value::StreamId;

/// Byte-at-a-time input with one byte of lookahead.
pub trait CharSource {
    /// Look at the next byte without consuming it. None at end of input.
    fn peek(&mut self) -> LispResult<Option<u8>>;

    /// Consume and return the next byte. None at end of input.
    fn advance(&mut self) -> LispResult<Option<u8>>;

    fn at_end(&mut self) -> LispResult<bool> {
        Ok(self.peek()?.is_none())
    }
}

/// Byte output.
pub trait CharSink {
    fn write_char(&mut self, ch: u8) -> LispResult<()>;

    fn write_str(&mut self, s: &str) -> LispResult<()> {
        for &b in s.as_bytes() {
            self.write_char(b)?;
        }
        Ok(())
    }
}

/// Input over a borrowed string, used for reading source text held in memory.
pub struct StrSource<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> StrSource<'a> {
    pub fn new(input: &'a str) -> Self {
        StrSource {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    /// Return current position in input.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl CharSource for StrSource<'_> {
    fn peek(&mut self) -> LispResult<Option<u8>> {
        Ok(self.input.get(self.pos).copied())
    }

    fn advance(&mut self) -> LispResult<Option<u8>> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        Ok(ch)
    }
}

/// One slot of the stream table.
pub enum Stream {
    Stdin {
        peeked: Option<u8>,
    },
    Stdout,
    Stderr,
    FileIn {
        reader: BufReader<File>,
        peeked: Option<u8>,
    },
    StringIn {
        bytes: Vec<u8>,
        pos: usize,
    },
    BufferOut(Vec<u8>),
    Closed,
}

/// Pull one byte from a reader, retrying on interruption.
fn read_byte(reader: &mut impl Read) -> LispResult<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

impl Stream {
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Stream::Stdin { .. } | Stream::FileIn { .. } | Stream::StringIn { .. }
        )
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Stream::Stdout | Stream::Stderr | Stream::BufferOut(_))
    }

    fn flush(&mut self) -> LispResult<()> {
        match self {
            Stream::Stdout => io::stdout().flush()?,
            Stream::Stderr => io::stderr().flush()?,
            _ => {}
        }
        Ok(())
    }
}

impl CharSource for Stream {
    fn peek(&mut self) -> LispResult<Option<u8>> {
        match self {
            Stream::Stdin { peeked } => {
                if peeked.is_none() {
                    *peeked = read_byte(&mut io::stdin().lock())?;
                }
                Ok(*peeked)
            }
            Stream::FileIn { reader, peeked } => {
                if peeked.is_none() {
                    *peeked = read_byte(reader)?;
                }
                Ok(*peeked)
            }
            Stream::StringIn { bytes, pos } => Ok(bytes.get(*pos).copied()),
            Stream::Closed => Err(LispError::Io("read from closed stream".into())),
            _ => Err(LispError::Io("read from output stream".into())),
        }
    }

    fn advance(&mut self) -> LispResult<Option<u8>> {
        let ch = self.peek()?;
        match self {
            Stream::Stdin { peeked } | Stream::FileIn { peeked, .. } => *peeked = None,
            Stream::StringIn { pos, .. } if ch.is_some() => *pos += 1,
            _ => {}
        }
        Ok(ch)
    }
}

impl CharSink for Stream {
    fn write_char(&mut self, ch: u8) -> LispResult<()> {
        match self {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(&[ch])?;
                if ch == b'\n' {
                    out.flush()?;
                }
                Ok(())
            }
            Stream::Stderr => Ok(io::stderr().write_all(&[ch])?),
            Stream::BufferOut(buf) => {
                buf.push(ch);
                Ok(())
            }
            Stream::Closed => Err(LispError::Io("write to closed stream".into())),
            _ => Err(LispError::Io("write to input stream".into())),
        }
    }

    fn write_str(&mut self, s: &str) -> LispResult<()> {
        match self {
            Stream::Stdout => Ok(io::stdout().lock().write_all(s.as_bytes())?),
            Stream::Stderr => Ok(io::stderr().write_all(s.as_bytes())?),
            Stream::BufferOut(buf) => {
                buf.extend_from_slice(s.as_bytes());
                Ok(())
            }
            Stream::Closed => Err(LispError::Io("write to closed stream".into())),
            _ => Err(LispError::Io("write to input stream".into())),
        }
    }
}

/// Manages all open streams. Ids are never reused: a released slot stays
/// closed for the life of the table.
pub struct StreamTable {
    streams: Vec<Stream>,
}

impl StreamTable {
    pub const STDIN: StreamId = StreamId(0);
    pub const STDOUT: StreamId = StreamId(1);
    pub const STDERR: StreamId = StreamId(2);

    pub fn new() -> Self {
        StreamTable {
            streams: vec![Stream::Stdin { peeked: None }, Stream::Stdout, Stream::Stderr],
        }
    }

    fn push(&mut self, stream: Stream) -> LispResult<StreamId> {
        let id = u32::try_from(self.streams.len())
            .map_err(|_| LispError::BudgetExceeded { arena: "stream" })?;
        self.streams.push(stream);
        Ok(StreamId(id))
    }

    /// Open a file for reading.
    pub fn open_for_reading(&mut self, path: &str) -> LispResult<StreamId> {
        let file = File::open(path)
            .map_err(|e| LispError::Io(format!("cannot open '{}': {}", path, e)))?;
        self.push(Stream::FileIn {
            reader: BufReader::new(file),
            peeked: None,
        })
    }

    /// Open an input stream over an in-memory copy of `text`.
    pub fn open_string(&mut self, text: &[u8]) -> LispResult<StreamId> {
        self.push(Stream::StringIn {
            bytes: text.to_vec(),
            pos: 0,
        })
    }

    /// Open an output stream that collects everything written to it.
    pub fn open_buffer(&mut self) -> LispResult<StreamId> {
        self.push(Stream::BufferOut(Vec::new()))
    }

    pub fn get_mut(&mut self, id: StreamId) -> LispResult<&mut Stream> {
        self.streams
            .get_mut(id.0 as usize)
            .ok_or_else(|| LispError::Io(format!("no stream {}", id.0)))
    }

    /// Close a stream, flushing pending output. Releasing twice is harmless.
    pub fn release(&mut self, id: StreamId) -> LispResult<()> {
        let stream = self.get_mut(id)?;
        stream.flush()?;
        *stream = Stream::Closed;
        Ok(())
    }

    /// Drain the bytes collected by a buffer stream.
    pub fn take_buffer(&mut self, id: StreamId) -> LispResult<Vec<u8>> {
        match self.get_mut(id)? {
            Stream::BufferOut(buf) => Ok(mem::take(buf)),
            _ => Err(LispError::Io(format!("stream {} is not a buffer", id.0))),
        }
    }

    /// Send everything written to the standard output stream into a buffer
    /// from now on. Collect it with `take_buffer(StreamTable::STDOUT)`.
    pub fn redirect_stdout(&mut self) {
        let slot = &mut self.streams[Self::STDOUT.0 as usize];
        if !matches!(slot, Stream::BufferOut(_)) {
            *slot = Stream::BufferOut(Vec::new());
        }
    }

    /// Human-readable state of a stream: "closed", "in" or "out".
    pub fn status(&self, id: StreamId) -> &'static str {
        match self.streams.get(id.0 as usize) {
            Some(s) if s.is_input() => "in",
            Some(s) if s.is_output() => "out",
            _ => "closed",
        }
    }

    /// Number of slots ever handed out, closed ones included.
    pub fn count(&self) -> usize {
        self.streams.len()
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        StreamTable::new()
    }
}
