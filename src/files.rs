//! File level entry points: single files, batches and whole directories.

use crate::{
    config::{ExportOptions, ImportOptions},
    format::{FormatKind, FormatVersion},
    model::{DetailModel, LevelDetails},
    parsers::{self, DetailsError},
    scene::{extract_level, extract_model, LevelSource, MeshSource},
    writers,
};
use log::{error, info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
    result::Result as StdResult,
};
use walkdir::WalkDir;

/// What a file decoded to.
#[derive(Debug, Clone, PartialEq)]
pub enum Imported {
    Model(DetailModel),
    Level(LevelDetails),
}

/// Picks the format from the file extension, ignoring case.
pub fn file_kind(path: &Path) -> StdResult<FormatKind, DetailsError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());

    match ext.as_deref() {
        Some("dm") => Ok(FormatKind::DetailModel),
        Some("details") => Ok(FormatKind::LevelDetails),
        _ => Err(DetailsError::UnknownExtension(path.to_path_buf())),
    }
}

/// Decodes one `.dm` or `.details` file. `.dm` files carry their own version, `version` only
/// applies to `.details` files.
pub fn import_file<P: AsRef<Path>>(
    path: P,
    version: FormatVersion,
    options: &ImportOptions,
) -> StdResult<Imported, DetailsError> {
    let path = path.as_ref();
    let kind = file_kind(path)?;
    let data = fs::read(path)?;

    let imported = match kind {
        FormatKind::DetailModel => Imported::Model(parsers::dm::decode(&data)?),
        FormatKind::LevelDetails => Imported::Level(parsers::details::decode(&data, version, options)?),
    };

    info!("imported {}", path.display());
    Ok(imported)
}

/// An editor object to export.
#[derive(Clone, Copy)]
pub enum SceneObject<'a> {
    Mesh(&'a dyn MeshSource),
    Level(&'a dyn LevelSource),
}

/// Encodes `object` and writes it to `path`. Nothing is written if encoding fails.
pub fn export_file<P: AsRef<Path>>(
    object: SceneObject<'_>,
    path: P,
    version: FormatVersion,
    options: &ExportOptions,
) -> StdResult<(), DetailsError> {
    let path = path.as_ref();

    let (expected, data) = match object {
        SceneObject::Mesh(mesh) => (
            FormatKind::DetailModel,
            writers::dm::encode(&extract_model(mesh, options)?, version)?,
        ),
        SceneObject::Level(level) => (
            FormatKind::LevelDetails,
            writers::details::encode(&extract_level(level, options)?, version, options)?,
        ),
    };

    if file_kind(path).ok() != Some(expected) {
        warn!("writing {:?} data to {}", expected, path.display());
    }

    fs::write(path, data)?;
    info!("exported {}", path.display());
    Ok(())
}

/// Exports every mesh into `dir` as `<name>.dm`.
pub fn export_models<P: AsRef<Path>>(
    meshes: &[&dyn MeshSource],
    dir: P,
    version: FormatVersion,
    options: &ExportOptions,
) -> StdResult<Vec<PathBuf>, DetailsError> {
    let mut written = Vec::with_capacity(meshes.len());

    for &mesh in meshes {
        let name = mesh.name();
        let file_name = if name.to_ascii_lowercase().ends_with(".dm") {
            name.to_owned()
        } else {
            format!("{}.dm", name)
        };

        let path = dir.as_ref().join(file_name);
        export_file(SceneObject::Mesh(mesh), &path, version, options)?;
        written.push(path);
    }

    Ok(written)
}

/// Per file outcome of a batch import.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<(PathBuf, StdResult<Imported, DetailsError>)>,
}

impl BatchReport {
    /// `true` if every file was imported.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|(_, result)| result.is_ok())
    }

    pub fn imported(&self) -> impl Iterator<Item = (&Path, &Imported)> {
        self.results
            .iter()
            .filter_map(|(path, result)| result.as_ref().ok().map(|imported| (path.as_path(), imported)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &DetailsError)> {
        self.results
            .iter()
            .filter_map(|(path, result)| result.as_ref().err().map(|e| (path.as_path(), e)))
    }
}

/// Imports files one after another. A failing file is recorded and logged, the rest of the batch
/// still runs.
pub fn import_files<I, P>(paths: I, version: FormatVersion, options: &ImportOptions) -> BatchReport
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut report = BatchReport::default();

    for path in paths {
        let path = path.as_ref();
        let result = import_file(path, version, options);
        if let Err(e) = &result {
            error!("failed to import {}: {}", path.display(), e);
        }
        report.results.push((path.to_path_buf(), result));
    }

    report
}

/// Imports every `.dm` and `.details` file below `dir`, in file name order.
pub fn import_directory<P: AsRef<Path>>(
    dir: P,
    version: FormatVersion,
    options: &ImportOptions,
) -> StdResult<BatchReport, DetailsError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && file_kind(entry.path()).is_ok() {
            paths.push(entry.into_path());
        }
    }

    Ok(import_files(paths, version, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::seamed_quad;

    #[test]
    fn kind_from_extension() {
        assert_eq!(file_kind(Path::new("a/grass.DM")).unwrap(), FormatKind::DetailModel);
        assert_eq!(file_kind(Path::new("level.details")).unwrap(), FormatKind::LevelDetails);
        assert!(matches!(
            file_kind(Path::new("level.ltx")),
            Err(DetailsError::UnknownExtension(_))
        ));
        assert!(file_kind(Path::new("noext")).is_err());
    }

    #[test]
    fn exported_model_imports_back() {
        let dir = tempfile::tempdir().unwrap();
        let quad = seamed_quad();
        let written = export_models(&[&quad], dir.path(), FormatVersion::Builds1569ToCop, &ExportOptions::default()).unwrap();
        assert_eq!(written, vec![dir.path().join("grass.dm")]);

        match import_file(&written[0], FormatVersion::Builds1096To1230, &ImportOptions::default()).unwrap() {
            Imported::Model(model) => {
                assert_eq!(model.positions.len(), 5);
                assert_eq!(model.triangles.len(), 2);
                assert_eq!(model.texture, "grass_a");
            }
            other => panic!("expected a model, got {:?}", other),
        }
    }

    #[test]
    fn failed_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut quad = seamed_quad();
        quad.image = None;
        let path = dir.path().join("grass.dm");
        assert!(export_file(SceneObject::Mesh(&quad), &path, FormatVersion::Builds1569ToCop, &ExportOptions::default()).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn batch_keeps_going_after_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let quad = seamed_quad();
        export_models(&[&quad], dir.path(), FormatVersion::Builds1233To1558, &ExportOptions::default()).unwrap();
        fs::write(dir.path().join("broken.dm"), [1u8, 0, 0, 0, 40, 0]).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let report = import_directory(dir.path(), FormatVersion::Builds1096To1230, &ImportOptions::default()).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.results.len(), 2);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.ends_with("broken.dm"));
        assert!(matches!(failures[0].1, DetailsError::TruncatedData));
        assert_eq!(report.imported().count(), 1);
    }

    #[test]
    fn unknown_extension_in_batch() {
        let report = import_files(
            vec![PathBuf::from("model.obj")],
            FormatVersion::Builds1569ToCop,
            &ImportOptions::default(),
        );
        assert!(!report.is_success());
        assert!(matches!(report.results[0].1, Err(DetailsError::UnknownExtension(_))));
    }
}
