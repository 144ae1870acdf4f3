use crate::{
    format::{ChunkSpec, ChunkTable},
    parsers::{failure, DetailsError, Result},
};
use linked_hash_map::LinkedHashMap;
use log::{debug, warn};
use nom::{bytes::complete::take, number::complete::le_u32, sequence::tuple};
use std::result::Result as StdResult;

/// Bit set in the id of chunks the engine stored compressed.
pub const COMPRESSED_MARK: u32 = 0x8000_0000;

/// A tagged, length prefixed record. `data` is exactly the declared payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub id: u32,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// A stream over the payload, for chunks that nest other chunks. The stream can never read
    /// past this chunk's bound.
    pub fn stream(&self) -> ChunkStream<'a> {
        ChunkStream::open(self.data)
    }
}

pub fn chunk<'a>(input: &'a [u8]) -> Result<'a, Chunk<'a>> {
    let (input, (id, size)) = tuple((le_u32, le_u32))(input)?;

    if id & COMPRESSED_MARK != 0 {
        return failure(DetailsError::CompressedChunk(id & !COMPRESSED_MARK));
    }

    let (input, data) = take(size as usize)(input)?;
    Ok((input, Chunk { id, data }))
}

/// Cursor over consecutive chunks in a buffer.
#[derive(Debug, Clone)]
pub struct ChunkStream<'a> {
    input: &'a [u8],
}

impl<'a> ChunkStream<'a> {
    pub fn open(buffer: &'a [u8]) -> Self {
        ChunkStream { input: buffer }
    }

    /// Returns `Ok(None)` at the end of the buffer. After an error the stream is exhausted.
    pub fn next_chunk(&mut self) -> StdResult<Option<Chunk<'a>>, DetailsError> {
        if self.input.is_empty() {
            return Ok(None);
        }

        match chunk(self.input) {
            Ok((rest, chunk)) => {
                self.input = rest;
                Ok(Some(chunk))
            }
            Err(e) => {
                self.input = &[];
                Err(e.into())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }
}

impl<'a> Iterator for ChunkStream<'a> {
    type Item = StdResult<Chunk<'a>, DetailsError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Payloads of the known chunks of a stream, in stream order.
#[derive(Debug, Default)]
pub struct Sections<'a> {
    found: LinkedHashMap<u32, &'a [u8]>,
}

impl<'a> Sections<'a> {
    pub fn get(&self, id: u32) -> Option<&'a [u8]> {
        self.found.get(&id).copied()
    }

    pub fn require(&self, id: u32) -> StdResult<&'a [u8], DetailsError> {
        self.get(id).ok_or(DetailsError::MissingChunk(id))
    }

    /// Ids of the chunks found, in stream order.
    pub fn ids(&self) -> Vec<u32> {
        self.found.keys().copied().collect()
    }
}

/// Walks a chunk stream against a layout table. Known chunks must come in table order, unknown
/// chunks are skipped.
///
/// A required chunk jumped over by a later known chunk is `MissingChunk`. A stream that ends
/// while a required chunk is still pending is `TruncatedData`, even if it ends cleanly on a
/// chunk boundary: nothing tells a file cut there apart from one that never had the chunk.
pub fn walk<'a>(buffer: &'a [u8], table: &ChunkTable) -> StdResult<Sections<'a>, DetailsError> {
    let order: Vec<&ChunkSpec> = table.values().collect();
    let mut cursor = 0;
    let mut sections = Sections::default();

    for chunk in ChunkStream::open(buffer) {
        let chunk = chunk?;

        match order.iter().position(|spec| spec.id == chunk.id) {
            Some(pos) if pos >= cursor => {
                if let Some(skipped) = order[cursor..pos].iter().find(|spec| spec.required) {
                    return Err(DetailsError::MissingChunk(skipped.id));
                }
                debug!("{} chunk, {} bytes", order[pos].name, chunk.data.len());
                sections.found.insert(chunk.id, chunk.data);
                cursor = pos + 1;
            }
            Some(pos) => {
                return Err(DetailsError::MalformedStream(format!(
                    "{} chunk ({:#x}) appears out of order",
                    order[pos].name, chunk.id
                )));
            }
            None => warn!(
                "skipping unknown chunk {:#x} ({} bytes)",
                chunk.id,
                chunk.data.len()
            ),
        }
    }

    // Running out of chunks before every required one showed up means the buffer was cut short.
    if order[cursor..].iter().any(|spec| spec.required) {
        return Err(DetailsError::TruncatedData);
    }

    Ok(sections)
}

/// Finds the payload of the leading `id` chunk so a version field can be read before the layout
/// is known. Unknown chunks in front of it are skipped, any other chunk from `known` is an error.
pub fn find_leading<'a>(buffer: &'a [u8], id: u32, known: &[u32]) -> StdResult<&'a [u8], DetailsError> {
    for chunk in ChunkStream::open(buffer) {
        let chunk = chunk?;
        if chunk.id == id {
            return Ok(chunk.data);
        }
        if known.contains(&chunk.id) {
            return Err(DetailsError::MissingChunk(id));
        }
    }
    Err(DetailsError::TruncatedData)
}
