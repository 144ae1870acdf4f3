//! # xray_details - Reader and writer for X-Ray engine detail files
//!
//! ## Example
//!
//! ```no_run
//! use xray_details::{files::{import_file, Imported}, FormatVersion, ImportOptions};
//!
//! /// Prints how many grid cells use each detail model of a level
//! fn main() -> Result<(), xray_details::DetailsError> {
//!     let imported = import_file("level.details", FormatVersion::Builds1096To1230, &ImportOptions::default())?;
//!
//!     if let Imported::Level(level) = imported {
//!         for (i, entry) in level.palette.iter().enumerate() {
//!             let used = level.slots.iter().filter(|slot| slot.model == Some(i)).count();
//!             println!("\"{}\" in {} slots", entry.name, used);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## The formats
//!
//! Levels of the X-Ray engine are covered with small decorative meshes: grass clumps, rocks, debris. Each of these
//! is a *detail model* and can be stored on its own as a `.dm` file. A level's `.details` file lays a regular grid
//! over the terrain and stores, for every cell (a *slot*), which detail model grows there, how high, how big and how
//! it is rotated. Newer builds also bake lighting into each slot. The detail models a level uses form its *palette*,
//! either embedded in the `.details` file one after another ("models in a row") or only referenced by name.
//!
//! Both formats are chunk streams: a little-endian `u32` id, a `u32` payload size, then the payload. Payloads may
//! themselves be chunk streams. Readers look for the chunks they know in a fixed order and skip, with a warning, any
//! chunk they don't know.
//!
//! ### Supported versions
//!
//! Three build ranges are supported: 1096-1230, 1233-1558 and 1569 up to Call of Pripyat. They are not compatible with
//! each other, so every call takes a [`FormatVersion`]. `.dm` files and version 3 `.details` files say which range they
//! belong to; the two older ranges share `.details` version 2 and the caller's choice decides how its slots are read.
//!
//! The differences between ranges live in the tables of the [`format`] module rather than in the codecs, see
//! [`format::resolve`].
//!
//! ### Coordinates
//!
//! The engine is Y up with the UV origin in the top left corner. Decoded positions and faces use the editor convention
//! instead: Z up, counter-clockwise faces. That conversion is exact and happens while reading and writing bytes. UVs
//! keep the engine's origin in [`model`] so they survive a round trip bit for bit, [`scene`] moves the origin to the
//! bottom left when it hands models to an editor and back when it takes them.
//!
//! ## This crate
//!
//! The codecs work on byte slices and never touch the filesystem, see [`decode_model`], [`decode_details`],
//! [`encode_model`] and [`encode_details`]. The [`files`] module adds file and batch import/export on top of them,
//! [`scene`] defines the traits an editor implements to receive and provide objects, and [`overlay`] produces the line
//! geometry for viewport helpers.
//!
//! Every error is fatal for the file being processed and no partially decoded object is ever returned. Lossy
//! conversions, like writing lighting to a version that can't store it, succeed and are reported through the `log`
//! crate.
//!
//! ### Limitations
//!
//! Chunks stored compressed by the engine are not supported, reading one fails with
//! [`DetailsError::CompressedChunk`].

pub mod config;
pub mod files;
pub mod format;
pub mod model;
pub mod overlay;
pub mod parsers;
pub mod scene;
pub mod writers;

pub use config::{ExportOptions, ImportOptions, Preferences, TexturePathStyle};
pub use format::{FormatKind, FormatVersion};
pub use model::{DetailModel, DetailSlot, LevelDetails, PaletteEntry, Placement, SlotLighting};
pub use parsers::details::decode as decode_details;
pub use parsers::dm::decode as decode_model;
pub use parsers::DetailsError;
pub use writers::details::encode as encode_details;
pub use writers::dm::encode as encode_model;
