pub mod chunk;
pub mod details;
pub mod dm;
pub mod primitive;

use nom::{
    error::{ErrorKind, ParseError},
    Err, IResult,
};
use std::{io, path::PathBuf, result::Result as StdResult};
use thiserror::Error;

pub(crate) type Result<'a, T> = IResult<&'a [u8], T, DetailsError>;

/// Errors that can happen while reading or writing `.dm` and `.details` data.
///
/// Every variant is fatal for the file being processed: no partially decoded object is ever
/// returned. Unknown chunks are not errors, they are skipped with a warning.
#[derive(Debug, Error)]
pub enum DetailsError {
    /// A nom combinator failed for a reason not covered by the other variants.
    #[error("parser error: {0:?}")]
    Nom(ErrorKind),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The buffer ends in the middle of a chunk, or before every required chunk was read.
    #[error("unexpected end of data")]
    TruncatedData,
    /// The data is framed correctly but its content is inconsistent (chunk order, counts,
    /// trailing bytes, out of range indices).
    #[error("malformed stream: {0}")]
    MalformedStream(String),
    /// A required chunk was skipped over.
    #[error("required chunk {0:#x} is missing")]
    MissingChunk(u32),
    #[error("grid is {width}x{height} but has {slots} slots")]
    GridSizeMismatch { width: u32, height: u32, slots: usize },
    /// The engine refuses detail models without vertices or triangles.
    #[error("detail model has no vertices or no triangles")]
    EmptyMesh,
    #[error("slot {slot} references model {index} but the palette has {palette_len} models")]
    UnresolvedModelReference {
        slot: usize,
        index: usize,
        palette_len: usize,
    },
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(String),
    /// Chunks with the engine's compression mark are not supported.
    #[error("chunk {0:#x} is compressed, compressed chunks are not supported")]
    CompressedChunk(u32),
    #[error("{count} detail models do not fit a palette of at most {limit}")]
    PaletteOverflow { count: usize, limit: usize },
    #[error("{0} vertices do not fit 16-bit indices")]
    TooManyVertices(usize),
    /// Models in a row were requested but a palette entry has no geometry to embed.
    #[error("palette entry \"{0}\" has no model data to embed")]
    MissingModelData(String),
    #[error("object \"{0}\" has neither an image nor a texture name")]
    MissingTexture(String),
    #[error("file format of {0} is not recognised")]
    UnknownExtension(PathBuf),
    #[error("invalid preferences: {0}")]
    Config(String),
}

impl ParseError<&[u8]> for DetailsError {
    fn from_error_kind(_input: &[u8], kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Eof => DetailsError::TruncatedData,
            kind => DetailsError::Nom(kind),
        }
    }

    // The innermost error is the meaningful one, combinators only add noise on top of it.
    fn append(_input: &[u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl From<Err<DetailsError>> for DetailsError {
    fn from(e: Err<DetailsError>) -> Self {
        match e {
            Err::Error(e) | Err::Failure(e) => e,
            Err::Incomplete(..) => DetailsError::TruncatedData,
        }
    }
}

/// Shorthand for a parser failure that must not be recovered by `alt`-like combinators.
pub(crate) fn failure<T>(e: DetailsError) -> StdResult<T, Err<DetailsError>> {
    Err(Err::Failure(e))
}

/// Runs `parser` over a whole chunk payload. Bytes left over after the parser finishes mean the
/// payload doesn't match the expected layout.
pub(crate) fn parse_all<'a, T, F>(data: &'a [u8], what: &str, mut parser: F) -> StdResult<T, DetailsError>
where
    F: FnMut(&'a [u8]) -> Result<'a, T>,
{
    let (rest, value) = parser(data)?;
    if !rest.is_empty() {
        return Err(DetailsError::MalformedStream(format!(
            "{} unread bytes at the end of the {} chunk",
            rest.len(),
            what
        )));
    }
    Ok(value)
}

/// Checks that a payload holds exactly `count` records of `stride` bytes before anything is
/// allocated for them.
pub(crate) fn expect_len(data: &[u8], count: usize, stride: usize, what: &str) -> StdResult<(), DetailsError> {
    let expected = count.checked_mul(stride).ok_or_else(|| {
        DetailsError::MalformedStream(format!("{} {} records overflow the address space", count, what))
    })?;

    if data.len() < expected {
        Err(DetailsError::TruncatedData)
    } else if data.len() > expected {
        Err(DetailsError::MalformedStream(format!(
            "{} chunk is {} bytes but {} records of {} bytes were declared",
            what,
            data.len(),
            count,
            stride
        )))
    } else {
        Ok(())
    }
}
