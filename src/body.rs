use std::{
    fmt,
    io::{self, Cursor, Read},
};

mod http_body;

pub use http_body::HttpBody;

/// Largest piece read from a streamed body at once. Lengths announced by the peer are never
/// trusted for allocations beyond this.
const CHUNK_SIZE: usize = 8 * 1024;

/// Body of an HTTP message, either sent or received.
#[derive(Default)]
pub struct Body(Option<BodyInner>);

#[derive(Default)]
enum BodyInner {
    #[default]
    Empty,
    Buffered(Vec<u8>),
    Iter(Box<dyn Iterator<Item = Vec<u8>>>),
    Reader(Box<dyn Read>, Option<usize>),
}

impl Body {
    pub fn empty() -> Self {
        Body(Some(BodyInner::Empty))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_iter<T: Into<Vec<u8>>>(chunks: impl IntoIterator<Item = T> + 'static) -> Self {
        Body(Some(BodyInner::Iter(Box::new(
            chunks.into_iter().map(|chunk| chunk.into()),
        ))))
    }

    /// Streams the body from `reader`. With a known `length` at most that many bytes are read,
    /// otherwise the reader is consumed until EOF.
    pub fn from_reader<T: Into<Option<usize>>>(reader: impl Read + 'static, length: T) -> Self {
        Body(Some(BodyInner::Reader(Box::new(reader), length.into())))
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Option<u64> {
        match &self.0 {
            Some(BodyInner::Empty) => Some(0),
            Some(BodyInner::Buffered(bytes)) => Some(bytes.len() as u64),
            Some(BodyInner::Iter(_)) => None,
            Some(BodyInner::Reader(_, Some(len))) => Some(*len as u64),
            Some(BodyInner::Reader(_, None)) => None,
            None => None,
        }
    }

    pub fn into_bytes(mut self) -> io::Result<Vec<u8>> {
        match self.0.take().unwrap_or_default() {
            BodyInner::Empty => Ok(Vec::new()),
            BodyInner::Buffered(bytes) => Ok(bytes),
            BodyInner::Iter(chunks) => Ok(chunks.flatten().collect()),
            BodyInner::Reader(stream, Some(len)) => {
                let mut buf = Vec::with_capacity(len.min(CHUNK_SIZE));
                stream.take(len as u64).read_to_end(&mut buf)?;
                Ok(buf)
            }
            BodyInner::Reader(mut stream, None) => {
                let mut buf = Vec::with_capacity(CHUNK_SIZE);
                stream.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    pub fn into_reader(mut self) -> BodyReader {
        match self.0.take().unwrap_or_default() {
            BodyInner::Empty => BodyReader(BodyReaderInner::Buffered(Cursor::new(Vec::new()))),
            BodyInner::Buffered(bytes) => BodyReader(BodyReaderInner::Buffered(Cursor::new(bytes))),
            BodyInner::Iter(mut chunks) => {
                let cursor = chunks.next().map(Cursor::new);
                BodyReader(BodyReaderInner::Iter(chunks, cursor))
            }
            BodyInner::Reader(stream, Some(len)) => {
                BodyReader(BodyReaderInner::Reader(Box::new(stream.take(len as u64))))
            }
            BodyInner::Reader(stream, None) => BodyReader(BodyReaderInner::Reader(stream)),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0 {
            Some(BodyInner::Empty) | None => "empty",
            Some(BodyInner::Buffered(_)) => "buffered",
            Some(BodyInner::Iter(_)) => "chunked",
            Some(BodyInner::Reader(..)) => "streamed",
        };

        f.debug_struct("Body")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

impl IntoIterator for Body {
    type Item = Vec<u8>;

    type IntoIter = BodyChunkIterator;

    fn into_iter(mut self) -> Self::IntoIter {
        match self.0.take().unwrap_or_default() {
            BodyInner::Empty => BodyChunkIterator(None),
            BodyInner::Buffered(bytes) => {
                BodyChunkIterator(Some(BodyChunkIterInner::Single(bytes)))
            }
            BodyInner::Iter(chunks) => BodyChunkIterator(Some(BodyChunkIterInner::Iter(chunks))),
            BodyInner::Reader(reader, len) => {
                BodyChunkIterator(Some(BodyChunkIterInner::Reader(reader, len)))
            }
        }
    }
}

// Unread streamed bodies are drained, otherwise the next message on the same
// connection would start in the middle of this one.
impl Drop for Body {
    fn drop(&mut self) {
        match self.0.take() {
            Some(BodyInner::Reader(stream, Some(len))) => {
                io::copy(&mut stream.take(len as u64), &mut io::sink()).ok();
            }
            Some(BodyInner::Reader(mut stream, None)) => {
                io::copy(&mut stream, &mut io::sink()).ok();
            }
            Some(BodyInner::Iter(chunks)) => chunks.for_each(drop),
            _ => {}
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(body: Vec<u8>) -> Self {
        Body(Some(BodyInner::Buffered(body)))
    }
}

impl From<&[u8]> for Body {
    fn from(body: &[u8]) -> Self {
        body.to_vec().into()
    }
}

impl From<&str> for Body {
    fn from(body: &str) -> Self {
        body.as_bytes().to_vec().into()
    }
}

impl From<String> for Body {
    fn from(body: String) -> Self {
        body.into_bytes().into()
    }
}

impl From<()> for Body {
    fn from(_: ()) -> Self {
        Body::empty()
    }
}

pub struct BodyReader(BodyReaderInner);

enum BodyReaderInner {
    Buffered(Cursor<Vec<u8>>),
    Iter(Box<dyn Iterator<Item = Vec<u8>>>, Option<Cursor<Vec<u8>>>),
    Reader(Box<dyn Read>),
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0 {
            BodyReaderInner::Buffered(ref mut cursor) => cursor.read(buf),
            BodyReaderInner::Reader(ref mut reader) => reader.read(buf),
            BodyReaderInner::Iter(ref mut iter, ref mut leftover) => {
                while let Some(ref mut cursor) = leftover {
                    let read = cursor.read(buf)?;
                    if read > 0 {
                        return Ok(read);
                    }
                    *leftover = iter.next().map(Cursor::new);
                }
                Ok(0)
            }
        }
    }
}

pub struct BodyChunkIterator(Option<BodyChunkIterInner>);

enum BodyChunkIterInner {
    Single(Vec<u8>),
    Iter(Box<dyn Iterator<Item = Vec<u8>>>),
    Reader(Box<dyn Read>, Option<usize>),
}

impl Iterator for BodyChunkIterator {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.0.take()? {
            BodyChunkIterInner::Single(bytes) => Some(bytes),
            BodyChunkIterInner::Iter(mut iter) => {
                let item = iter.next()?;
                self.0 = Some(BodyChunkIterInner::Iter(iter));
                Some(item)
            }
            BodyChunkIterInner::Reader(mut reader, remaining) => {
                let wanted = remaining.map_or(CHUNK_SIZE, |left| left.min(CHUNK_SIZE));
                if wanted == 0 {
                    return None;
                }

                let mut buf = vec![0_u8; wanted];
                match reader.read(&mut buf).ok()? {
                    0 => None,
                    read => {
                        buf.truncate(read);
                        let remaining = remaining.map(|left| left - read);
                        self.0 = Some(BodyChunkIterInner::Reader(reader, remaining));
                        Some(buf)
                    }
                }
            }
        }
    }
}
