//! Per build range layout tables for the `.dm` and `.details` formats.
//!
//! The codecs never branch on a `FormatVersion` directly, they ask this module for a layout and
//! follow it: which chunks to expect and in which order, how vertices are packed and which fields
//! a slot record carries.

use crate::parsers::DetailsError;
use linked_hash_map::LinkedHashMap;
use serde::{Deserialize, Serialize};
use std::{f32::consts::TAU, fmt, result::Result as StdResult, str::FromStr};

/// Chunk ids of a `.dm` stream.
pub mod dm {
    pub const HEADER: u32 = 0x1;
    pub const VERTICES: u32 = 0x2;
    pub const INDICES: u32 = 0x3;
    pub const TEXTURE: u32 = 0x4;
    pub const SHADER: u32 = 0x5;

    pub const ALL: [u32; 5] = [HEADER, VERTICES, INDICES, TEXTURE, SHADER];
}

/// Chunk ids of a `.details` stream.
pub mod details {
    pub const HEADER: u32 = 0x0;
    pub const OBJECTS: u32 = 0x1;
    pub const SLOTS: u32 = 0x2;
    pub const OBJECT_REFS: u32 = 0x3;

    pub const ALL: [u32; 4] = [HEADER, OBJECTS, SLOTS, OBJECT_REFS];

    /// Chunk ids inside one embedded palette entry.
    pub mod object {
        pub const NAME: u32 = 0x0;
        pub const MODEL: u32 = 0x1;
    }
}

/// The engine build ranges this crate can read and write. Files from different ranges are not
/// compatible with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormatVersion {
    #[serde(rename = "builds_1096-1230")]
    Builds1096To1230,
    #[serde(rename = "builds_1233-1558")]
    Builds1233To1558,
    #[default]
    #[serde(rename = "builds_1569-cop")]
    Builds1569ToCop,
}

impl FormatVersion {
    pub const ALL: [FormatVersion; 3] = [
        FormatVersion::Builds1096To1230,
        FormatVersion::Builds1233To1558,
        FormatVersion::Builds1569ToCop,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FormatVersion::Builds1096To1230 => "builds_1096-1230",
            FormatVersion::Builds1233To1558 => "builds_1233-1558",
            FormatVersion::Builds1569ToCop => "builds_1569-cop",
        }
    }

    /// The value of the `version` field in a `.details` header.
    pub fn details_version(self) -> u32 {
        match self {
            FormatVersion::Builds1096To1230 | FormatVersion::Builds1233To1558 => 2,
            FormatVersion::Builds1569ToCop => 3,
        }
    }

    /// The value of the `format` field in a `.dm` header.
    pub fn model_format(self) -> u16 {
        match self {
            FormatVersion::Builds1096To1230 => 1,
            FormatVersion::Builds1233To1558 => 2,
            FormatVersion::Builds1569ToCop => 3,
        }
    }

    pub fn from_model_format(format: u16) -> StdResult<Self, DetailsError> {
        FormatVersion::ALL
            .iter()
            .copied()
            .find(|v| v.model_format() == format)
            .ok_or_else(|| DetailsError::UnsupportedVersion(format!("detail model format {}", format)))
    }

    /// Picks the layout for a `.details` file. Version 3 files identify themselves, the two
    /// version 2 build ranges share a header value so the caller's choice decides between them.
    pub fn for_details_header(requested: Self, header_version: u32) -> StdResult<Self, DetailsError> {
        match header_version {
            3 => {
                if requested != FormatVersion::Builds1569ToCop {
                    log::debug!(
                        "file declares details version 3, reading it as {} instead of {}",
                        FormatVersion::Builds1569ToCop,
                        requested
                    );
                }
                Ok(FormatVersion::Builds1569ToCop)
            }
            2 if requested.details_version() == 2 => Ok(requested),
            2 => Err(DetailsError::UnsupportedVersion(format!(
                "file declares details version 2, which {} cannot read; choose builds 1096-1230 or 1233-1558",
                requested
            ))),
            other => Err(DetailsError::UnsupportedVersion(format!(
                "details version {}",
                other
            ))),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatVersion {
    type Err = DetailsError;

    fn from_str(s: &str) -> StdResult<Self, Self::Err> {
        FormatVersion::ALL
            .iter()
            .copied()
            .find(|v| v.name() == s)
            .ok_or_else(|| DetailsError::UnsupportedVersion(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub id: u32,
    pub name: &'static str,
    pub required: bool,
}

/// Chunk specs keyed by id, in the order they appear in a stream.
pub type ChunkTable = LinkedHashMap<u32, ChunkSpec>;

fn table(specs: &[ChunkSpec]) -> ChunkTable {
    specs.iter().map(|spec| (spec.id, *spec)).collect()
}

const fn required(id: u32, name: &'static str) -> ChunkSpec {
    ChunkSpec { id, name, required: true }
}

const fn optional(id: u32, name: &'static str) -> ChunkSpec {
    ChunkSpec { id, name, required: false }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexPacking {
    /// Every position first, then every UV.
    Planar,
    /// Position and UV of one vertex next to each other.
    Interleaved,
}

#[derive(Debug, Clone)]
pub struct ModelLayout {
    pub version: FormatVersion,
    pub chunks: ChunkTable,
    pub vertices: VertexPacking,
    /// Whether the header carries flags and the min/max scale.
    pub scale_range: bool,
}

impl ModelLayout {
    pub const VERTEX_SIZE: usize = 5 * 4;
    pub const INDEX_SIZE: usize = 2;

    pub fn for_version(version: FormatVersion) -> Self {
        match version {
            FormatVersion::Builds1096To1230 => ModelLayout {
                version,
                chunks: table(&[
                    required(dm::HEADER, "header"),
                    required(dm::TEXTURE, "texture"),
                    required(dm::VERTICES, "vertices"),
                    required(dm::INDICES, "indices"),
                ]),
                vertices: VertexPacking::Planar,
                scale_range: false,
            },
            FormatVersion::Builds1233To1558 | FormatVersion::Builds1569ToCop => ModelLayout {
                version,
                chunks: table(&[
                    required(dm::HEADER, "header"),
                    required(dm::TEXTURE, "texture"),
                    optional(dm::SHADER, "shader"),
                    required(dm::VERTICES, "vertices"),
                    required(dm::INDICES, "indices"),
                ]),
                vertices: VertexPacking::Interleaved,
                scale_range: true,
            },
        }
    }

    pub fn has_shader(&self) -> bool {
        self.chunks.contains_key(&dm::SHADER)
    }

    pub fn header_size(&self) -> usize {
        // format + reserved, two counts, bounding box
        let base = 2 + 2 + 4 + 4 + 6 * 4;
        if self.scale_range {
            base + 3 * 4
        } else {
            base
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    U8,
    U16,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::U8 => 1,
            IntWidth::U16 => 2,
        }
    }

    /// Number of distinct values the field can hold.
    pub fn steps(self) -> u32 {
        1 << (8 * self.bytes())
    }
}

/// One field of a slot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    /// `f32` base height followed by `f32` height range.
    Heights,
    /// `u32`: base height (bits 0-11), height range (bits 12-19), model index (bits 20-25).
    PackedWord,
    /// Model index as a single byte.
    Model,
    /// `u8` scale in 1/64 steps.
    Scale,
    /// Rotation around the vertical axis, a full turn spread over the integer range.
    Rotation(IntWidth),
    /// `u32`: dir, hemi, r, g, b nibbles from the lowest bits up.
    Lighting,
    Padding(usize),
}

impl SlotField {
    pub fn size(self) -> usize {
        match self {
            SlotField::Heights => 8,
            SlotField::PackedWord | SlotField::Lighting => 4,
            SlotField::Model | SlotField::Scale => 1,
            SlotField::Rotation(width) => width.bytes(),
            SlotField::Padding(len) => len,
        }
    }
}

const SLOT_FIELDS_1096: &[SlotField] = &[
    SlotField::Heights,
    SlotField::Model,
    SlotField::Scale,
    SlotField::Rotation(IntWidth::U8),
    SlotField::Padding(1),
];

const SLOT_FIELDS_1233: &[SlotField] = &[
    SlotField::Heights,
    SlotField::Model,
    SlotField::Scale,
    SlotField::Rotation(IntWidth::U16),
    SlotField::Lighting,
];

const SLOT_FIELDS_COP: &[SlotField] = &[
    SlotField::PackedWord,
    SlotField::Lighting,
    SlotField::Rotation(IntWidth::U16),
    SlotField::Scale,
    SlotField::Padding(1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub fields: &'static [SlotField],
    /// Model index value marking a cell without a detail model.
    pub empty_model: u32,
    /// Largest palette the index field can address.
    pub model_limit: usize,
}

impl SlotLayout {
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.size()).sum()
    }

    pub fn has_lighting(&self) -> bool {
        self.fields.contains(&SlotField::Lighting)
    }
}

#[derive(Debug, Clone)]
pub struct DetailsLayout {
    pub version: FormatVersion,
    pub chunks: ChunkTable,
    pub slot: SlotLayout,
}

impl DetailsLayout {
    pub const HEADER_SIZE: usize = 4 + 4 + 3 * 4 + 4 + 4;

    pub fn for_version(version: FormatVersion) -> Self {
        // Palette chunks are both optional here, the codec checks that exactly one is present.
        let chunks = table(&[
            required(details::HEADER, "header"),
            optional(details::OBJECTS, "objects"),
            optional(details::OBJECT_REFS, "object references"),
            required(details::SLOTS, "slots"),
        ]);

        let slot = match version {
            FormatVersion::Builds1096To1230 => SlotLayout {
                fields: SLOT_FIELDS_1096,
                empty_model: 0xFF,
                model_limit: 0xFF,
            },
            FormatVersion::Builds1233To1558 => SlotLayout {
                fields: SLOT_FIELDS_1233,
                empty_model: 0xFF,
                model_limit: 0xFF,
            },
            FormatVersion::Builds1569ToCop => SlotLayout {
                fields: SLOT_FIELDS_COP,
                empty_model: 0x3F,
                model_limit: 0x3F,
            },
        };

        DetailsLayout { version, chunks, slot }
    }

    /// Chunks of one embedded palette entry.
    pub fn object_chunks() -> ChunkTable {
        table(&[
            required(details::object::NAME, "object name"),
            required(details::object::MODEL, "object model"),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    DetailModel,
    LevelDetails,
}

#[derive(Debug, Clone)]
pub enum LayoutDescriptor {
    Model(ModelLayout),
    Details(DetailsLayout),
}

impl LayoutDescriptor {
    pub fn chunks(&self) -> &ChunkTable {
        match self {
            LayoutDescriptor::Model(layout) => &layout.chunks,
            LayoutDescriptor::Details(layout) => &layout.chunks,
        }
    }
}

pub fn resolve(version: FormatVersion, kind: FormatKind) -> LayoutDescriptor {
    match kind {
        FormatKind::DetailModel => LayoutDescriptor::Model(ModelLayout::for_version(version)),
        FormatKind::LevelDetails => LayoutDescriptor::Details(DetailsLayout::for_version(version)),
    }
}

/// Fixed point encodings shared by the slot reader and writer.
pub mod quant {
    use super::TAU;

    pub const BASE_HEIGHT_STEP: f32 = 0.25;
    pub const BASE_HEIGHT_OFFSET: f32 = -512.0;
    pub const BASE_HEIGHT_MAX: u32 = 0xFFF;
    pub const HEIGHT_STEP: f32 = 0.125;
    pub const HEIGHT_MAX: u32 = 0xFF;
    pub const SCALE_STEP: f32 = 1.0 / 64.0;
    pub const SCALE_MAX: u32 = 0xFF;
    pub const NIBBLE_MAX: u8 = 0xF;

    pub fn dequantize(q: u32, step: f32, offset: f32) -> f32 {
        q as f32 * step + offset
    }

    /// Returns the nearest step and whether the value had to be clamped into `0..=max`.
    pub fn quantize(value: f32, step: f32, offset: f32, max: u32) -> (u32, bool) {
        let q = ((value - offset) / step).round();
        if q.is_nan() || q < 0.0 {
            (0, true)
        } else if q > max as f32 {
            (max, true)
        } else {
            (q as u32, false)
        }
    }

    pub fn rotation_from_steps(q: u32, steps: u32) -> f32 {
        q as f32 * (TAU / steps as f32)
    }

    pub fn rotation_to_steps(angle: f32, steps: u32) -> u32 {
        let turns = (angle / TAU).rem_euclid(1.0);
        (turns * steps as f32).round() as u32 % steps
    }
}
