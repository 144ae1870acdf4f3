use glam::{Vec2, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};
use xray_details::{
    decode_details, decode_model, encode_details, encode_model,
    format::DetailsLayout,
    DetailModel, DetailSlot, DetailsError, ExportOptions, FormatVersion, ImportOptions, LevelDetails,
    PaletteEntry, Placement, SlotLighting,
};

fn chunk(data: &mut Vec<u8>, id: u32, payload: &[u8]) {
    data.extend_from_slice(&id.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
}

fn refs_only() -> ExportOptions {
    ExportOptions {
        models_in_a_row: false,
        ..ExportOptions::default()
    }
}

/// The 2x1 builds 1096-1230 level with one referenced model, written out by hand.
fn rock01_bytes() -> Vec<u8> {
    let mut header = Vec::new();
    for v in &[2u32, 1] {
        header.extend_from_slice(&v.to_le_bytes());
    }
    header.extend_from_slice(&[0; 12]);
    for v in &[2u32, 1] {
        header.extend_from_slice(&v.to_le_bytes());
    }

    let mut slots = Vec::new();
    for rotation in &[0u8, 64] {
        slots.extend_from_slice(&0f32.to_le_bytes());
        slots.extend_from_slice(&0f32.to_le_bytes());
        slots.extend_from_slice(&[0, 64, *rotation, 0]);
    }

    let mut data = Vec::new();
    chunk(&mut data, 0x0, &header);
    chunk(&mut data, 0x3, b"rock01.dm\0");
    chunk(&mut data, 0x2, &slots);
    data
}

fn rock01_level() -> LevelDetails {
    LevelDetails {
        width: 2,
        height: 1,
        base: Vec3::ZERO,
        palette: vec![PaletteEntry::reference("rock01.dm")],
        slots: vec![
            DetailSlot::new(0, Placement::IDENTITY),
            DetailSlot::new(
                0,
                Placement {
                    rotation: FRAC_PI_2,
                    ..Placement::IDENTITY
                },
            ),
        ],
    }
}

#[test]
fn rock01_decodes_and_reencodes_byte_identical() {
    let data = rock01_bytes();
    let level = decode_details(&data, FormatVersion::Builds1096To1230, &ImportOptions::default()).unwrap();
    assert_eq!(level, rock01_level());

    let encoded = encode_details(&level, FormatVersion::Builds1096To1230, &refs_only()).unwrap();
    assert_eq!(encoded, data);
}

#[test]
fn every_truncation_is_reported() {
    let data = rock01_bytes();
    for len in 0..data.len() {
        let result = decode_details(&data[..len], FormatVersion::Builds1096To1230, &ImportOptions::default());
        assert!(matches!(result, Err(DetailsError::TruncatedData)), "prefix of {} bytes", len);
    }

    let level = full_level(FormatVersion::Builds1569ToCop);
    let data = encode_details(&level, FormatVersion::Builds1569ToCop, &ExportOptions::default()).unwrap();
    for len in 0..data.len() {
        let result = decode_details(&data[..len], FormatVersion::Builds1569ToCop, &ImportOptions::default());
        assert!(matches!(result, Err(DetailsError::TruncatedData)), "prefix of {} bytes", len);
    }
}

#[test]
fn dangling_slot_reference() {
    let mut data = rock01_bytes();
    let slots_start = data.len() - 24;
    data[slots_start + 8] = 5;

    let err = decode_details(&data, FormatVersion::Builds1096To1230, &ImportOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        DetailsError::UnresolvedModelReference { slot: 0, index: 5, palette_len: 1 }
    ));
}

#[test]
fn unknown_trailing_chunk_is_ignored() {
    let mut data = rock01_bytes();
    chunk(&mut data, 0x77, b"editor notes");
    let level = decode_details(&data, FormatVersion::Builds1096To1230, &ImportOptions::default()).unwrap();
    assert_eq!(level, rock01_level());
}

#[test]
fn palette_only_import() {
    let options = ImportOptions {
        load_slots: false,
        ..ImportOptions::default()
    };
    let level = decode_details(&rock01_bytes(), FormatVersion::Builds1096To1230, &options).unwrap();
    assert!(!level.has_slots());
    assert_eq!(level.palette, rock01_level().palette);
    assert_eq!((level.width, level.height), (2, 1));
}

#[test]
fn version_2_file_needs_an_old_build_range() {
    let err = decode_details(&rock01_bytes(), FormatVersion::Builds1569ToCop, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, DetailsError::UnsupportedVersion(_)));
}

fn tuft(texture: &str, width: f32) -> DetailModel {
    DetailModel::new(
        vec![
            Vec3::new(-width, 0.0, 0.0),
            Vec3::new(width, 0.0, 0.0),
            Vec3::new(width, 0.0, 0.5),
            Vec3::new(-width, 0.0, 0.5),
        ],
        vec![Vec2::new(0.1, 0.3), Vec2::new(0.9, 0.3), Vec2::new(0.9, 0.7), Vec2::new(0.1, 0.7)],
        vec![[0, 1, 2], [0, 2, 3]],
        texture,
    )
}

/// A 3x2 level with embedded models, using values every layout stores exactly.
fn full_level(version: FormatVersion) -> LevelDetails {
    let mut level = LevelDetails::new(
        3,
        2,
        Vec3::new(-96.0, 32.0, 2.5),
        vec![
            PaletteEntry::embedded("grass_a.dm", tuft("detail\\grass_a", 0.25)),
            PaletteEntry::embedded("rock01.dm", tuft("detail\\rock", 1.0)),
        ],
    );

    let placements = [
        (Some(0), 12.5, 1.5, 0.75, 0.0),
        (None, 0.0, 0.0, 1.0, 0.0),
        (Some(1), -3.25, 0.125, 1.5, FRAC_PI_2),
        (Some(0), 100.0, 4.0, 0.5, PI),
        (Some(1), 0.0, 0.0, 1.0, 0.0),
        (None, 0.0, 0.0, 1.0, 0.0),
    ];
    let lit = DetailsLayout::for_version(version).slot.has_lighting();

    for (slot, &(model, base_height, height, scale, rotation)) in level.slots.iter_mut().zip(&placements) {
        *slot = DetailSlot {
            model,
            placement: Placement {
                base_height,
                height,
                scale,
                rotation,
            },
            lighting: if lit {
                Some(SlotLighting { dir: 7, hemi: 15, r: 1, g: 2, b: 3 })
            } else {
                None
            },
        };
    }
    level
}

#[test]
fn round_trip_with_embedded_models() {
    for &version in &FormatVersion::ALL {
        let level = full_level(version);
        let data = encode_details(&level, version, &ExportOptions::default()).unwrap();
        let back = decode_details(&data, version, &ImportOptions::default()).unwrap();
        assert_eq!(back, level, "{}", version);
        assert_eq!(back.slots.len(), (back.width * back.height) as usize);
    }
}

#[test]
fn round_trip_with_referenced_models() {
    for &version in &FormatVersion::ALL {
        let level = full_level(version);
        let data = encode_details(&level, version, &refs_only()).unwrap();
        let back = decode_details(&data, version, &ImportOptions::default()).unwrap();

        let mut expected = level.clone();
        for entry in &mut expected.palette {
            entry.model = None;
        }
        assert_eq!(back, expected, "{}", version);
    }
}

#[test]
fn embedded_models_can_be_skipped() {
    let level = full_level(FormatVersion::Builds1233To1558);
    let data = encode_details(&level, FormatVersion::Builds1233To1558, &ExportOptions::default()).unwrap();
    let names_only = ImportOptions {
        load_models: false,
        ..ImportOptions::default()
    };
    let back = decode_details(&data, FormatVersion::Builds1233To1558, &names_only).unwrap();
    assert!(back.palette.iter().all(|entry| entry.model.is_none()));
    assert_eq!(back.slots, level.slots);
}

#[test]
fn row_layout_does_not_affect_decoding() {
    let level = full_level(FormatVersion::Builds1569ToCop);
    let data = encode_details(&level, FormatVersion::Builds1569ToCop, &ExportOptions::default()).unwrap();
    let stacked = ImportOptions {
        models_in_a_row: false,
        ..ImportOptions::default()
    };
    let back = decode_details(&data, FormatVersion::Builds1569ToCop, &stacked).unwrap();
    assert!(back.has_embedded_models());
    assert_eq!(back, level);
}

#[test]
fn slot_count_must_match_grid() {
    let mut level = full_level(FormatVersion::Builds1569ToCop);
    level.width = 4;
    let err = encode_details(&level, FormatVersion::Builds1569ToCop, &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, DetailsError::GridSizeMismatch { width: 4, height: 2, slots: 6 }));
}

#[test]
fn palette_must_fit_the_index_field() {
    let mut level = rock01_level();
    level.palette = (0..256).map(|i| PaletteEntry::reference(format!("m{}.dm", i))).collect();
    let err = encode_details(&level, FormatVersion::Builds1096To1230, &refs_only()).unwrap_err();
    assert!(matches!(err, DetailsError::PaletteOverflow { count: 256, limit: 255 }));
}

#[test]
fn detail_model_round_trip() {
    let model = tuft("detail\\grass_a", 0.25);
    for &version in &FormatVersion::ALL {
        let back = decode_model(&encode_model(&model, version).unwrap()).unwrap();
        assert_eq!(back, model, "{}", version);
    }

    let mut empty = model;
    empty.positions.clear();
    empty.uvs.clear();
    empty.triangles.clear();
    assert!(matches!(
        encode_model(&empty, FormatVersion::Builds1569ToCop),
        Err(DetailsError::EmptyMesh)
    ));
}
