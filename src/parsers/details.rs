use crate::{
    config::ImportOptions,
    format::{details, quant, DetailsLayout, FormatVersion, IntWidth, SlotField, SlotLayout},
    model::{swap_yz, DetailSlot, LevelDetails, PaletteEntry, Placement, SlotLighting},
    parsers::{
        chunk::{find_leading, walk, ChunkStream},
        dm, expect_len, parse_all,
        primitive::{read_f32, read_string, read_u16, read_u32, read_u8, read_vec3, skip},
        DetailsError, Result,
    },
};
use glam::Vec3;
use log::{debug, info};
use nom::{multi::count, sequence::tuple};
use std::result::Result as StdResult;

#[derive(Debug, Clone, PartialEq)]
pub struct DetailsHeader {
    pub version: u32,
    pub model_count: u32,
    /// Engine space grid origin.
    pub base: Vec3,
    pub width: u32,
    pub height: u32,
}

pub fn header(input: &[u8]) -> Result<DetailsHeader> {
    let (input, (version, model_count, base, width, height)) =
        tuple((read_u32, read_u32, read_vec3, read_u32, read_u32))(input)?;

    Ok((
        input,
        DetailsHeader {
            version,
            model_count,
            base,
            width,
            height,
        },
    ))
}

/// A slot record before its model index is checked against the palette.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RawSlot {
    model: u32,
    placement: Placement,
    lighting: Option<SlotLighting>,
}

pub(crate) fn unpack_lighting(word: u32) -> SlotLighting {
    let nibble = |shift: u32| ((word >> shift) & 0xF) as u8;
    SlotLighting {
        dir: nibble(0),
        hemi: nibble(4),
        r: nibble(8),
        g: nibble(12),
        b: nibble(16),
    }
}

fn slot<'a>(mut input: &'a [u8], layout: &SlotLayout) -> Result<'a, RawSlot> {
    let mut raw = RawSlot {
        model: layout.empty_model,
        placement: Placement::IDENTITY,
        lighting: None,
    };

    for field in layout.fields {
        input = match *field {
            SlotField::Heights => {
                let (input, (base_height, height)) = tuple((read_f32, read_f32))(input)?;
                raw.placement.base_height = base_height;
                raw.placement.height = height;
                input
            }
            SlotField::PackedWord => {
                let (input, word) = read_u32(input)?;
                raw.placement.base_height = quant::dequantize(
                    word & quant::BASE_HEIGHT_MAX,
                    quant::BASE_HEIGHT_STEP,
                    quant::BASE_HEIGHT_OFFSET,
                );
                raw.placement.height =
                    quant::dequantize((word >> 12) & quant::HEIGHT_MAX, quant::HEIGHT_STEP, 0.0);
                raw.model = (word >> 20) & 0x3F;
                input
            }
            SlotField::Model => {
                let (input, model) = read_u8(input)?;
                raw.model = u32::from(model);
                input
            }
            SlotField::Scale => {
                let (input, scale) = read_u8(input)?;
                raw.placement.scale = quant::dequantize(u32::from(scale), quant::SCALE_STEP, 0.0);
                input
            }
            SlotField::Rotation(width) => {
                let (input, q) = match width {
                    IntWidth::U8 => read_u8(input).map(|(i, q)| (i, u32::from(q)))?,
                    IntWidth::U16 => read_u16(input).map(|(i, q)| (i, u32::from(q)))?,
                };
                raw.placement.rotation = quant::rotation_from_steps(q, width.steps());
                input
            }
            SlotField::Lighting => {
                let (input, word) = read_u32(input)?;
                raw.lighting = Some(unpack_lighting(word));
                input
            }
            SlotField::Padding(len) => skip(input, len)?.0,
        };
    }

    Ok((input, raw))
}

fn slots(
    data: &[u8],
    layout: &SlotLayout,
    slot_count: usize,
    palette_len: usize,
) -> StdResult<Vec<DetailSlot>, DetailsError> {
    let mut slots = Vec::with_capacity(slot_count);

    for (i, record) in data.chunks(layout.size()).enumerate() {
        let raw = parse_all(record, "slots", |input| slot(input, layout))?;

        let model = if raw.model == layout.empty_model {
            None
        } else if (raw.model as usize) < palette_len {
            Some(raw.model as usize)
        } else {
            return Err(DetailsError::UnresolvedModelReference {
                slot: i,
                index: raw.model as usize,
                palette_len,
            });
        };

        slots.push(DetailSlot {
            model,
            placement: raw.placement,
            lighting: raw.lighting,
        });
    }

    Ok(slots)
}

/// Reads the embedded palette. Entries are nested chunks numbered from zero, each holding a name
/// and a complete `.dm` stream of the same build range.
fn objects(
    data: &[u8],
    version: FormatVersion,
    model_count: usize,
    load_geometry: bool,
) -> StdResult<Vec<PaletteEntry>, DetailsError> {
    let object_chunks = DetailsLayout::object_chunks();
    let mut stream = ChunkStream::open(data);
    let mut palette = Vec::new();

    for index in 0..model_count {
        let entry = stream.next_chunk()?.ok_or(DetailsError::TruncatedData)?;
        if entry.id as usize != index {
            return Err(DetailsError::MalformedStream(format!(
                "palette entry {} is stored as chunk {:#x}",
                index, entry.id
            )));
        }

        let sections = walk(entry.data, &object_chunks)?;
        let name = parse_all(sections.require(details::object::NAME)?, "object name", read_string)?;
        let model_data = sections.require(details::object::MODEL)?;

        let model = if load_geometry {
            let (model_version, model) = dm::decode_versioned(model_data)?;
            if model_version != version {
                return Err(DetailsError::MalformedStream(format!(
                    "detail model \"{}\" is {} inside a {} file",
                    name, model_version, version
                )));
            }
            Some(model)
        } else {
            // Framing is still validated so a broken file doesn't pass as a good one.
            for chunk in ChunkStream::open(model_data) {
                chunk?;
            }
            None
        };

        palette.push(PaletteEntry { name, model });
    }

    if !stream.is_empty() {
        return Err(DetailsError::MalformedStream(format!(
            "objects chunk holds more than the {} declared models",
            model_count
        )));
    }

    Ok(palette)
}

fn object_refs(data: &[u8], model_count: usize) -> StdResult<Vec<PaletteEntry>, DetailsError> {
    // Every name takes at least its terminator.
    if model_count > data.len() {
        return Err(DetailsError::TruncatedData);
    }

    let names = parse_all(data, "object references", count(read_string, model_count))?;
    Ok(names.into_iter().map(PaletteEntry::reference).collect())
}

/// Reads the header version of a `.details` stream without decoding anything else.
pub fn sniff_version(buffer: &[u8]) -> StdResult<u32, DetailsError> {
    let header = find_leading(buffer, details::HEADER, &details::ALL)?;
    let (_, version) = read_u32(header)?;
    Ok(version)
}

/// Decodes a `.details` stream. Version 2 files are read with the requested build range, version
/// 3 files always use the 1569-CoP layout.
pub fn decode(
    buffer: &[u8],
    requested: FormatVersion,
    options: &ImportOptions,
) -> StdResult<LevelDetails, DetailsError> {
    let version = FormatVersion::for_details_header(requested, sniff_version(buffer)?)?;
    let layout = DetailsLayout::for_version(version);
    let sections = walk(buffer, &layout.chunks)?;

    let header = parse_all(sections.require(details::HEADER)?, "header", header)?;
    if header.width == 0 || header.height == 0 {
        return Err(DetailsError::MalformedStream(format!(
            "grid dimensions must be positive, got {}x{}",
            header.width, header.height
        )));
    }
    debug!(
        "{} level details: {}x{} grid, {} models",
        version, header.width, header.height, header.model_count
    );

    let model_count = header.model_count as usize;
    let palette = match (sections.get(details::OBJECTS), sections.get(details::OBJECT_REFS)) {
        (Some(data), None) => objects(data, version, model_count, options.load_models)?,
        (None, Some(data)) => object_refs(data, model_count)?,
        (Some(_), Some(_)) => {
            return Err(DetailsError::MalformedStream(
                "both embedded and referenced palettes are present".to_owned(),
            ))
        }
        (None, None) => return Err(DetailsError::MissingChunk(details::OBJECTS)),
    };

    let slot_count = (header.width as usize)
        .checked_mul(header.height as usize)
        .ok_or_else(|| DetailsError::MalformedStream("grid size overflows".to_owned()))?;
    let slot_data = sections.require(details::SLOTS)?;
    expect_len(slot_data, slot_count, layout.slot.size(), "slots")?;

    let slots = if options.load_slots {
        slots(slot_data, &layout.slot, slot_count, palette.len())?
    } else {
        Vec::new()
    };

    info!(
        "decoded {}x{} level details with {} models and {} slots",
        header.width,
        header.height,
        palette.len(),
        slots.len()
    );

    Ok(LevelDetails {
        width: header.width,
        height: header.height,
        base: swap_yz(header.base),
        palette,
        slots,
    })
}
