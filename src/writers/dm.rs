use crate::{
    format::{dm, FormatVersion, ModelLayout, VertexPacking},
    model::{flip_winding, swap_yz, DetailModel, DEFAULT_SHADER},
    parsers::DetailsError,
    writers::ChunkWriter,
};
use glam::{Vec2, Vec3};
use log::{debug, warn};
use std::result::Result as StdResult;

/// Geometry converted to engine space, ready to be written.
struct EngineMesh {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u16>,
    bbox: (Vec3, Vec3),
}

impl EngineMesh {
    fn convert(model: &DetailModel) -> StdResult<Self, DetailsError> {
        model.validate()?;
        if model.positions.len() > usize::from(u16::MAX) {
            return Err(DetailsError::TooManyVertices(model.positions.len()));
        }

        let positions: Vec<Vec3> = model.positions.iter().copied().map(swap_yz).collect();
        let first = positions[0];
        let bbox = positions
            .iter()
            .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)));

        // validate() bounds every index by the vertex count, which fits u16 here
        let indices = model
            .triangles
            .iter()
            .flat_map(|&tri| flip_winding(tri))
            .map(|i| i as u16)
            .collect();

        Ok(EngineMesh {
            positions,
            uvs: model.uvs.clone(),
            indices,
            bbox,
        })
    }
}

fn warn_dropped_fields(model: &DetailModel, layout: &ModelLayout) {
    if !layout.has_shader() && model.shader != DEFAULT_SHADER {
        warn!(
            "{} detail models have no shader, dropping \"{}\"",
            layout.version, model.shader
        );
    }
    if !layout.scale_range && (model.flags != 0 || model.min_scale != 1.0 || model.max_scale != 1.0) {
        warn!(
            "{} detail models have no flags or scale range, dropping them",
            layout.version
        );
    }
}

fn write_header(w: &mut ChunkWriter, layout: &ModelLayout, model: &DetailModel, mesh: &EngineMesh) {
    w.write_u16(layout.version.model_format())
        .write_u16(0)
        .write_u32(mesh.positions.len() as u32)
        .write_u32(mesh.indices.len() as u32)
        .write_vec3(mesh.bbox.0)
        .write_vec3(mesh.bbox.1);

    if layout.scale_range {
        w.write_u32(model.flags)
            .write_f32(model.min_scale)
            .write_f32(model.max_scale);
    }
}

fn write_vertices(w: &mut ChunkWriter, packing: VertexPacking, mesh: &EngineMesh) {
    match packing {
        VertexPacking::Interleaved => {
            for (&p, &uv) in mesh.positions.iter().zip(&mesh.uvs) {
                w.write_vec3(p).write_vec2(uv);
            }
        }
        VertexPacking::Planar => {
            for &p in &mesh.positions {
                w.write_vec3(p);
            }
            for &uv in &mesh.uvs {
                w.write_vec2(uv);
            }
        }
    }
}

/// Appends the chunks of one detail model to `w`.
pub fn write(w: &mut ChunkWriter, model: &DetailModel, version: FormatVersion) -> StdResult<(), DetailsError> {
    let layout = ModelLayout::for_version(version);
    let mesh = EngineMesh::convert(model)?;
    warn_dropped_fields(model, &layout);

    for spec in layout.chunks.values() {
        w.begin_chunk(spec.id);
        match spec.id {
            dm::HEADER => write_header(w, &layout, model, &mesh),
            dm::TEXTURE => {
                w.write_string(&model.texture)?;
            }
            dm::SHADER => {
                w.write_string(&model.shader)?;
            }
            dm::VERTICES => write_vertices(w, layout.vertices, &mesh),
            dm::INDICES => {
                for &i in &mesh.indices {
                    w.write_u16(i);
                }
            }
            other => {
                return Err(DetailsError::MalformedStream(format!(
                    "no writer for detail model chunk {:#x}",
                    other
                )))
            }
        }
        w.end_chunk()?;
    }

    debug!(
        "wrote {} detail model: {} vertices, {} triangles",
        version,
        mesh.positions.len(),
        model.triangles.len()
    );
    Ok(())
}

/// Encodes a detail model as a standalone `.dm` stream.
pub fn encode(model: &DetailModel, version: FormatVersion) -> StdResult<Vec<u8>, DetailsError> {
    let mut w = ChunkWriter::new();
    write(&mut w, model, version)?;
    w.finish()
}
