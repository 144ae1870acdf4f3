//! In-memory scene description produced by the decoders and consumed by the encoders.
//!
//! Positions and faces are kept in the editor's convention: Z up, right handed,
//! counter-clockwise front faces. The codecs convert them from and to the engine's convention
//! (Y up, left handed) at the byte boundary. UVs stay in the engine's convention, origin in the
//! top left corner, so they are stored bit for bit; [`crate::scene`] flips V when models are
//! handed to or taken from an editor.

use crate::parsers::DetailsError;
use glam::{Vec2, Vec3};
use std::result::Result as StdResult;

/// Shader assigned to detail models by the engine's level editor.
pub const DEFAULT_SHADER: &str = "details\\blend";

/// Detail model flag: the model doesn't sway in the wind.
pub const FLAG_NO_WAVING: u32 = 0x1;

/// Swaps the Y and Z axes. Applying it twice gives back the input, so the same function maps
/// engine to editor space and back.
pub fn swap_yz(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

/// Moves the V origin between the top and the bottom of the texture.
pub fn flip_v(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x, 1.0 - uv.y)
}

/// Reverses triangle winding, needed because `swap_yz` mirrors the geometry.
pub fn flip_winding([a, b, c]: [u32; 3]) -> [u32; 3] {
    [a, c, b]
}

/// A single small decorative mesh (grass clump, rock, debris) placed repeatedly across a level.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailModel {
    pub positions: Vec<Vec3>,
    /// One UV per position, origin in the top left corner.
    pub uvs: Vec<Vec2>,
    /// Indices into `positions`.
    pub triangles: Vec<[u32; 3]>,
    /// Texture reference, relative to the game's textures folder and without extension.
    pub texture: String,
    pub shader: String,
    pub flags: u32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl DetailModel {
    pub fn new<S: Into<String>>(
        positions: Vec<Vec3>,
        uvs: Vec<Vec2>,
        triangles: Vec<[u32; 3]>,
        texture: S,
    ) -> Self {
        DetailModel {
            positions,
            uvs,
            triangles,
            texture: texture.into(),
            shader: DEFAULT_SHADER.to_owned(),
            flags: 0,
            min_scale: 1.0,
            max_scale: 1.0,
        }
    }

    /// Axis aligned bounds of the positions, `None` for a model without vertices.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p))),
        )
    }

    /// UVs with the origin moved to the bottom left corner, as editors expect them.
    pub fn editor_uvs(&self) -> Vec<Vec2> {
        self.uvs.iter().copied().map(flip_v).collect()
    }

    pub fn no_waving(&self) -> bool {
        self.flags & FLAG_NO_WAVING != 0
    }

    /// Compares what every format version preserves: geometry and the texture reference.
    pub fn same_geometry(&self, other: &DetailModel) -> bool {
        self.positions == other.positions
            && self.uvs == other.uvs
            && self.triangles == other.triangles
            && self.texture == other.texture
    }

    /// Checks the invariants the engine relies on before a model is written.
    pub fn validate(&self) -> StdResult<(), DetailsError> {
        if self.positions.is_empty() || self.triangles.is_empty() {
            return Err(DetailsError::EmptyMesh);
        }

        if self.uvs.len() != self.positions.len() {
            return Err(DetailsError::MalformedStream(format!(
                "{} UVs for {} vertices",
                self.uvs.len(),
                self.positions.len()
            )));
        }

        let vertex_count = self.positions.len();
        if let Some(tri) = self
            .triangles
            .iter()
            .find(|tri| tri.iter().any(|&i| i as usize >= vertex_count))
        {
            return Err(DetailsError::MalformedStream(format!(
                "triangle {:?} points past {} vertices",
                tri, vertex_count
            )));
        }

        Ok(())
    }
}

/// Placement of the detail model inside one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Height of the lowest point of the cell.
    pub base_height: f32,
    /// Vertical extent of the cell above `base_height`.
    pub height: f32,
    pub scale: f32,
    /// Rotation around the vertical axis, in radians.
    pub rotation: f32,
}

impl Placement {
    pub const IDENTITY: Placement = Placement {
        base_height: 0.0,
        height: 0.0,
        scale: 1.0,
        rotation: 0.0,
    };
}

impl Default for Placement {
    fn default() -> Self {
        Placement::IDENTITY
    }
}

/// Baked lighting of one cell. Every channel is a nibble (`0..=15`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotLighting {
    pub dir: u8,
    pub hemi: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// One grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetailSlot {
    /// Index into the level palette, `None` for an empty cell.
    pub model: Option<usize>,
    pub placement: Placement,
    /// Only present in formats that store lighting per slot.
    pub lighting: Option<SlotLighting>,
}

impl DetailSlot {
    pub fn new(model: usize, placement: Placement) -> Self {
        DetailSlot {
            model: Some(model),
            placement,
            lighting: None,
        }
    }

    pub fn empty() -> Self {
        DetailSlot::default()
    }
}

/// A palette entry. `model` is `None` when the level only references an external `.dm` file.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    pub name: String,
    pub model: Option<DetailModel>,
}

impl PaletteEntry {
    pub fn reference<S: Into<String>>(name: S) -> Self {
        PaletteEntry {
            name: name.into(),
            model: None,
        }
    }

    pub fn embedded<S: Into<String>>(name: S, model: DetailModel) -> Self {
        PaletteEntry {
            name: name.into(),
            model: Some(model),
        }
    }
}

/// The level-wide grid of detail slots.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDetails {
    pub width: u32,
    pub height: u32,
    /// Position of the grid origin.
    pub base: Vec3,
    pub palette: Vec<PaletteEntry>,
    /// Row-major, `width * height` entries. Empty when slots were not loaded.
    pub slots: Vec<DetailSlot>,
}

impl LevelDetails {
    /// Creates a grid of empty cells.
    pub fn new(width: u32, height: u32, base: Vec3, palette: Vec<PaletteEntry>) -> Self {
        LevelDetails {
            width,
            height,
            base,
            palette,
            slots: vec![DetailSlot::empty(); width as usize * height as usize],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn slot(&self, x: u32, z: u32) -> Option<&DetailSlot> {
        self.index(x, z).and_then(move |i| self.slots.get(i))
    }

    pub fn slot_mut(&mut self, x: u32, z: u32) -> Option<&mut DetailSlot> {
        let i = self.index(x, z)?;
        self.slots.get_mut(i)
    }

    fn index(&self, x: u32, z: u32) -> Option<usize> {
        if x < self.width && z < self.height {
            Some(z as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn check_grid(&self) -> StdResult<(), DetailsError> {
        if self.width == 0 || self.height == 0 {
            return Err(DetailsError::MalformedStream(format!(
                "grid dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }

        if self.slots.len() != self.slot_count() {
            return Err(DetailsError::GridSizeMismatch {
                width: self.width,
                height: self.height,
                slots: self.slots.len(),
            });
        }

        Ok(())
    }

    pub fn check_references(&self) -> StdResult<(), DetailsError> {
        let palette_len = self.palette.len();
        for (slot, s) in self.slots.iter().enumerate() {
            if let Some(index) = s.model {
                if index >= palette_len {
                    return Err(DetailsError::UnresolvedModelReference {
                        slot,
                        index,
                        palette_len,
                    });
                }
            }
        }
        Ok(())
    }

    /// `true` if every palette entry carries its geometry.
    pub fn has_embedded_models(&self) -> bool {
        self.palette.iter().all(|entry| entry.model.is_some())
    }
}
