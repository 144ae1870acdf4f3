use super::{DetailsError, Result};
use glam::{Vec2, Vec3};
use nom::{
    bytes::complete::take,
    combinator::map,
    number::complete::{le_f32, le_u16, le_u32, le_u8},
    sequence::tuple,
    Err,
};

// All X-Ray formats are little-endian, there is no endianness marker to look at.

pub fn read_u8(input: &[u8]) -> Result<u8> {
    le_u8(input)
}

pub fn read_u16(input: &[u8]) -> Result<u16> {
    le_u16(input)
}

pub fn read_u32(input: &[u8]) -> Result<u32> {
    le_u32(input)
}

pub fn read_f32(input: &[u8]) -> Result<f32> {
    le_f32(input)
}

pub fn read_vec2(input: &[u8]) -> Result<Vec2> {
    map(tuple((le_f32, le_f32)), |(x, y)| Vec2::new(x, y))(input)
}

pub fn read_vec3(input: &[u8]) -> Result<Vec3> {
    map(tuple((le_f32, le_f32, le_f32)), |(x, y, z)| Vec3::new(x, y, z))(input)
}

/// Reads a NUL terminated string. Non UTF-8 bytes (the engine writes cp1251 paths) are replaced
/// instead of failing the whole file.
pub fn read_string(input: &[u8]) -> Result<String> {
    match input.iter().position(|&b| b == 0) {
        Some(end) => Ok((
            &input[end + 1..],
            String::from_utf8_lossy(&input[..end]).into_owned(),
        )),
        None => Err(Err::Error(DetailsError::TruncatedData)),
    }
}

pub fn skip(input: &[u8], len: usize) -> Result<()> {
    let (input, _) = take(len)(input)?;
    Ok((input, ()))
}
