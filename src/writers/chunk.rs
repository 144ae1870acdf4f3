use crate::parsers::DetailsError;
use glam::{Vec2, Vec3};
use std::result::Result as StdResult;

/// Builds a chunk stream in memory. Chunk sizes are written as placeholders and patched when the
/// chunk is closed, so chunks can nest freely.
#[derive(Debug, Default)]
pub struct ChunkWriter {
    data: Vec<u8>,
    /// Offsets of the size fields of the chunks still open, innermost last.
    open: Vec<usize>,
}

impl ChunkWriter {
    pub fn new() -> Self {
        ChunkWriter::default()
    }

    pub fn begin_chunk(&mut self, id: u32) -> &mut Self {
        self.write_u32(id);
        self.open.push(self.data.len());
        self.write_u32(0)
    }

    pub fn end_chunk(&mut self) -> StdResult<&mut Self, DetailsError> {
        let at = self
            .open
            .pop()
            .ok_or_else(|| DetailsError::MalformedStream("end_chunk without an open chunk".to_owned()))?;

        let size = u32::try_from(self.data.len() - at - 4).map_err(|_| {
            DetailsError::MalformedStream(format!("chunk payload of {} bytes is too large", self.data.len() - at))
        })?;
        self.data[at..at + 4].copy_from_slice(&size.to_le_bytes());
        Ok(self)
    }

    /// Writes a whole chunk, `f` fills in the payload.
    pub fn chunk<F>(&mut self, id: u32, f: F) -> StdResult<&mut Self, DetailsError>
    where
        F: FnOnce(&mut Self) -> StdResult<(), DetailsError>,
    {
        self.begin_chunk(id);
        f(self)?;
        self.end_chunk()
    }

    pub fn write_u8(&mut self, v: u8) -> &mut Self {
        self.data.push(v);
        self
    }

    pub fn write_u16(&mut self, v: u16) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> &mut Self {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_vec2(&mut self, v: Vec2) -> &mut Self {
        self.write_f32(v.x).write_f32(v.y)
    }

    pub fn write_vec3(&mut self, v: Vec3) -> &mut Self {
        self.write_f32(v.x).write_f32(v.y).write_f32(v.z)
    }

    /// Writes a NUL terminated string. Strings with an embedded NUL can't be read back and are
    /// rejected.
    pub fn write_string(&mut self, s: &str) -> StdResult<&mut Self, DetailsError> {
        if s.contains('\0') {
            return Err(DetailsError::MalformedStream(format!(
                "string {:?} contains a NUL byte",
                s
            )));
        }
        self.write_bytes(s.as_bytes());
        Ok(self.write_u8(0))
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn write_zeros(&mut self, len: usize) -> &mut Self {
        self.data.resize(self.data.len() + len, 0);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn finish(self) -> StdResult<Vec<u8>, DetailsError> {
        if !self.open.is_empty() {
            return Err(DetailsError::MalformedStream(format!(
                "{} chunks were never closed",
                self.open.len()
            )));
        }
        Ok(self.data)
    }
}
