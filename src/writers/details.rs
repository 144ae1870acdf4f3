use crate::{
    config::ExportOptions,
    format::{details, quant, DetailsLayout, FormatVersion, IntWidth, SlotField, SlotLayout},
    model::{swap_yz, DetailSlot, LevelDetails, PaletteEntry, SlotLighting},
    parsers::DetailsError,
    writers::{dm, ChunkWriter},
};
use log::{info, warn};
use std::result::Result as StdResult;

/// Counts lossy conversions so each kind is reported once per file instead of once per slot.
#[derive(Debug, Default)]
struct Losses {
    clamped: usize,
    dropped_lighting: usize,
}

impl Losses {
    fn report(&self, version: FormatVersion) {
        if self.clamped > 0 {
            warn!("{} slot values were clamped to fit the {} slot layout", self.clamped, version);
        }
        if self.dropped_lighting > 0 {
            warn!(
                "{} slots carry lighting that {} files can't store, dropping it",
                self.dropped_lighting, version
            );
        }
    }
}

fn quantize(losses: &mut Losses, value: f32, step: f32, offset: f32, max: u32) -> u32 {
    let (q, clamped) = quant::quantize(value, step, offset, max);
    if clamped {
        losses.clamped += 1;
    }
    q
}

fn pack_lighting(losses: &mut Losses, light: &SlotLighting) -> u32 {
    [light.dir, light.hemi, light.r, light.g, light.b]
        .iter()
        .enumerate()
        .fold(0, |word, (i, &nibble)| {
            if nibble > quant::NIBBLE_MAX {
                losses.clamped += 1;
            }
            word | u32::from(nibble.min(quant::NIBBLE_MAX)) << (4 * i)
        })
}

fn write_slot(w: &mut ChunkWriter, layout: &SlotLayout, slot: &DetailSlot, losses: &mut Losses) {
    let model = slot.model.map_or(layout.empty_model, |i| i as u32);
    let placement = &slot.placement;

    if slot.lighting.is_some() && !layout.has_lighting() {
        losses.dropped_lighting += 1;
    }

    for field in layout.fields {
        match *field {
            SlotField::Heights => {
                w.write_f32(placement.base_height).write_f32(placement.height);
            }
            SlotField::PackedWord => {
                let base = quantize(
                    losses,
                    placement.base_height,
                    quant::BASE_HEIGHT_STEP,
                    quant::BASE_HEIGHT_OFFSET,
                    quant::BASE_HEIGHT_MAX,
                );
                let height = quantize(losses, placement.height, quant::HEIGHT_STEP, 0.0, quant::HEIGHT_MAX);
                w.write_u32(base | height << 12 | model << 20);
            }
            SlotField::Model => {
                w.write_u8(model as u8);
            }
            SlotField::Scale => {
                let q = quantize(losses, placement.scale, quant::SCALE_STEP, 0.0, quant::SCALE_MAX);
                w.write_u8(q as u8);
            }
            SlotField::Rotation(width) => {
                let q = quant::rotation_to_steps(placement.rotation, width.steps());
                match width {
                    IntWidth::U8 => w.write_u8(q as u8),
                    IntWidth::U16 => w.write_u16(q as u16),
                };
            }
            SlotField::Lighting => {
                let light = slot.lighting.unwrap_or_default();
                let word = pack_lighting(losses, &light);
                w.write_u32(word);
            }
            SlotField::Padding(len) => {
                w.write_zeros(len);
            }
        }
    }
}

fn write_objects(
    w: &mut ChunkWriter,
    palette: &[PaletteEntry],
    version: FormatVersion,
) -> StdResult<(), DetailsError> {
    for (index, entry) in palette.iter().enumerate() {
        let model = entry
            .model
            .as_ref()
            .ok_or_else(|| DetailsError::MissingModelData(entry.name.clone()))?;

        w.chunk(index as u32, |w| {
            w.chunk(details::object::NAME, |w| w.write_string(&entry.name).map(|_| ()))?;
            w.chunk(details::object::MODEL, |w| dm::write(w, model, version))?;
            Ok(())
        })?;
    }
    Ok(())
}

/// Encodes level details. With `models_in_a_row` every palette entry is embedded with its
/// geometry, otherwise only the palette names are written.
pub fn encode(
    level: &LevelDetails,
    version: FormatVersion,
    options: &ExportOptions,
) -> StdResult<Vec<u8>, DetailsError> {
    level.check_grid()?;
    level.check_references()?;

    let layout = DetailsLayout::for_version(version);
    if level.palette.len() > layout.slot.model_limit {
        return Err(DetailsError::PaletteOverflow {
            count: level.palette.len(),
            limit: layout.slot.model_limit,
        });
    }

    let mut w = ChunkWriter::new();
    let mut losses = Losses::default();

    for spec in layout.chunks.values() {
        match spec.id {
            details::HEADER => {
                w.chunk(spec.id, |w| {
                    w.write_u32(version.details_version())
                        .write_u32(level.palette.len() as u32)
                        .write_vec3(swap_yz(level.base))
                        .write_u32(level.width)
                        .write_u32(level.height);
                    Ok(())
                })?;
            }
            details::OBJECTS if options.models_in_a_row => {
                w.chunk(spec.id, |w| write_objects(w, &level.palette, version))?;
            }
            details::OBJECT_REFS if !options.models_in_a_row => {
                w.chunk(spec.id, |w| {
                    for entry in &level.palette {
                        w.write_string(&entry.name)?;
                    }
                    Ok(())
                })?;
            }
            details::OBJECTS | details::OBJECT_REFS => {}
            details::SLOTS => {
                w.chunk(spec.id, |w| {
                    for slot in &level.slots {
                        write_slot(w, &layout.slot, slot, &mut losses);
                    }
                    Ok(())
                })?;
            }
            other => {
                return Err(DetailsError::MalformedStream(format!(
                    "no writer for level details chunk {:#x}",
                    other
                )))
            }
        }
    }

    losses.report(version);
    info!(
        "encoded {}x{} level details as {} ({} models{})",
        level.width,
        level.height,
        version,
        level.palette.len(),
        if options.models_in_a_row { ", embedded" } else { "" }
    );
    w.finish()
}
