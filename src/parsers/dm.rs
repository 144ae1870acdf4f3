use crate::{
    format::{dm, FormatVersion, ModelLayout, VertexPacking},
    model::{flip_winding, swap_yz, DetailModel, DEFAULT_SHADER},
    parsers::{
        chunk::{find_leading, walk},
        expect_len, parse_all,
        primitive::{read_f32, read_string, read_u16, read_u32, read_vec2, read_vec3},
        DetailsError, Result,
    },
};
use glam::{Vec2, Vec3};
use log::debug;
use nom::{multi::count, sequence::tuple};
use std::result::Result as StdResult;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelHeader {
    pub vertex_count: u32,
    pub index_count: u32,
    /// Engine space bounding box. Informational only, the writer recomputes it.
    pub bbox: (Vec3, Vec3),
    pub flags: u32,
    pub min_scale: f32,
    pub max_scale: f32,
}

fn header<'a>(input: &'a [u8], layout: &ModelLayout) -> Result<'a, ModelHeader> {
    let (input, (_format, _reserved)) = tuple((read_u16, read_u16))(input)?;
    let (input, (vertex_count, index_count, bbox_min, bbox_max)) =
        tuple((read_u32, read_u32, read_vec3, read_vec3))(input)?;

    let (input, (flags, min_scale, max_scale)) = if layout.scale_range {
        tuple((read_u32, read_f32, read_f32))(input)?
    } else {
        (input, (0, 1.0, 1.0))
    };

    Ok((
        input,
        ModelHeader {
            vertex_count,
            index_count,
            bbox: (bbox_min, bbox_max),
            flags,
            min_scale,
            max_scale,
        },
    ))
}

fn vertices<'a>(input: &'a [u8], packing: VertexPacking, n: usize) -> Result<'a, (Vec<Vec3>, Vec<Vec2>)> {
    match packing {
        VertexPacking::Interleaved => {
            let (input, pairs) = count(tuple((read_vec3, read_vec2)), n)(input)?;
            Ok((input, pairs.into_iter().unzip()))
        }
        VertexPacking::Planar => tuple((count(read_vec3, n), count(read_vec2, n)))(input),
    }
}

/// Reads the format field of a `.dm` stream without decoding anything else.
pub fn sniff_version(buffer: &[u8]) -> StdResult<FormatVersion, DetailsError> {
    let header = find_leading(buffer, dm::HEADER, &dm::ALL)?;
    let (_, format) = read_u16(header)?;
    FormatVersion::from_model_format(format)
}

/// Decodes a `.dm` stream, the format version is taken from the stream itself.
pub fn decode(buffer: &[u8]) -> StdResult<DetailModel, DetailsError> {
    decode_versioned(buffer).map(|(_, model)| model)
}

pub fn decode_versioned(buffer: &[u8]) -> StdResult<(FormatVersion, DetailModel), DetailsError> {
    let version = sniff_version(buffer)?;
    let layout = ModelLayout::for_version(version);
    let sections = walk(buffer, &layout.chunks)?;

    let header = parse_all(sections.require(dm::HEADER)?, "header", |i| header(i, &layout))?;
    debug!(
        "{} detail model: {} vertices, {} indices",
        version, header.vertex_count, header.index_count
    );

    if header.vertex_count == 0 || header.index_count == 0 {
        return Err(DetailsError::EmptyMesh);
    }
    if header.index_count % 3 != 0 {
        return Err(DetailsError::MalformedStream(format!(
            "{} indices do not form whole triangles",
            header.index_count
        )));
    }

    let texture = parse_all(sections.require(dm::TEXTURE)?, "texture", read_string)?;
    let shader = match sections.get(dm::SHADER) {
        Some(data) => parse_all(data, "shader", read_string)?,
        None => DEFAULT_SHADER.to_owned(),
    };

    let vertex_count = header.vertex_count as usize;
    let vertex_data = sections.require(dm::VERTICES)?;
    expect_len(vertex_data, vertex_count, ModelLayout::VERTEX_SIZE, "vertices")?;
    let (positions, uvs) = parse_all(vertex_data, "vertices", |i| vertices(i, layout.vertices, vertex_count))?;

    let index_count = header.index_count as usize;
    let index_data = sections.require(dm::INDICES)?;
    expect_len(index_data, index_count, ModelLayout::INDEX_SIZE, "indices")?;
    let indices = parse_all(index_data, "indices", count(read_u16, index_count))?;

    let mut triangles = Vec::with_capacity(index_count / 3);
    for tri in indices.chunks(3) {
        let tri = [u32::from(tri[0]), u32::from(tri[1]), u32::from(tri[2])];
        if tri.iter().any(|&i| i >= header.vertex_count) {
            return Err(DetailsError::MalformedStream(format!(
                "triangle {:?} points past {} vertices",
                tri, header.vertex_count
            )));
        }
        triangles.push(flip_winding(tri));
    }

    let model = DetailModel {
        positions: positions.into_iter().map(swap_yz).collect(),
        uvs,
        triangles,
        texture,
        shader,
        flags: header.flags,
        min_scale: header.min_scale,
        max_scale: header.max_scale,
    };

    Ok((version, model))
}
