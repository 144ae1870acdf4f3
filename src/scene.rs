//! Binding between decoded data and an editor's scene.
//!
//! The crate never touches editor types. An editor plugs in by implementing [`SceneHost`] to
//! receive decoded models, and [`MeshSource`] / [`LevelSource`] to hand its objects back for
//! export.

use crate::{
    config::{ExportOptions, ImportOptions, TexturePathStyle},
    model::{flip_v, DetailModel, DetailSlot, LevelDetails, PaletteEntry, DEFAULT_SHADER},
    parsers::DetailsError,
};
use glam::{Vec2, Vec3};
use log::debug;
use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    result::Result as StdResult,
};

/// Gap left between palette models laid out in a row.
pub const ROW_GAP: f32 = 1.0;

/// Material settings for one imported model.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    pub name: String,
    /// Image file the texture reference resolves to.
    pub image: PathBuf,
    pub texture: String,
    pub shader: String,
}

/// What the importer needs from an editor.
pub trait SceneHost {
    type Mesh;
    type Object;

    /// `model` comes with its UV origin already in the bottom left corner.
    fn create_mesh(&mut self, name: &str, model: &DetailModel) -> Self::Mesh;
    fn set_material(&mut self, mesh: &mut Self::Mesh, material: &MaterialDesc);
    fn create_object(
        &mut self,
        name: &str,
        mesh: Option<Self::Mesh>,
        location: Vec3,
        parent: Option<&Self::Object>,
    ) -> Self::Object;
}

/// Resolves a texture reference such as `detail\grass_a` to its `.dds` image.
pub fn texture_image_path(texture: &str, textures_folder: Option<&Path>) -> PathBuf {
    let mut path = textures_folder.map(Path::to_path_buf).unwrap_or_default();
    path.extend(texture.split(|c: char| c == '\\' || c == '/').filter(|part| !part.is_empty()));
    path.set_extension("dds");
    path
}

fn material_for(name: &str, model: &DetailModel, textures_folder: Option<&Path>) -> MaterialDesc {
    MaterialDesc {
        name: name.to_owned(),
        image: texture_image_path(&model.texture, textures_folder),
        texture: model.texture.clone(),
        shader: model.shader.clone(),
    }
}

fn add_model<H: SceneHost>(
    host: &mut H,
    name: &str,
    model: &DetailModel,
    location: Vec3,
    parent: Option<&H::Object>,
    options: &ImportOptions,
) -> H::Object {
    let editor = DetailModel {
        uvs: model.editor_uvs(),
        ..model.clone()
    };
    let mut mesh = host.create_mesh(name, &editor);
    host.set_material(&mut mesh, &material_for(name, model, options.textures_folder.as_deref()));
    host.create_object(name, Some(mesh), location, parent)
}

/// Creates the mesh, material and object of a single detail model.
pub fn instantiate_model<H: SceneHost>(
    host: &mut H,
    name: &str,
    model: &DetailModel,
    options: &ImportOptions,
) -> H::Object {
    add_model(host, name, model, Vec3::ZERO, None, options)
}

#[derive(Debug)]
pub struct LevelObjects<O> {
    pub root: O,
    /// One entry per palette entry, `None` for entries without geometry.
    pub models: Vec<Option<O>>,
}

/// Creates an empty root at the grid base with one child per palette model.
pub fn instantiate_level<H: SceneHost>(
    host: &mut H,
    name: &str,
    level: &LevelDetails,
    options: &ImportOptions,
) -> LevelObjects<H::Object> {
    let root = host.create_object(name, None, level.base, None);
    let mut models = Vec::with_capacity(level.palette.len());
    let mut row_end = 0.0;

    for entry in &level.palette {
        let model = match &entry.model {
            Some(model) => model,
            None => {
                models.push(None);
                continue;
            }
        };

        let mut location = Vec3::ZERO;
        if options.models_in_a_row {
            if let Some((min, max)) = model.bounds() {
                location.x = row_end - min.x;
                row_end = location.x + max.x + ROW_GAP;
            }
        }

        debug!("placing palette model \"{}\" at {}", entry.name, location);
        models.push(Some(add_model(host, &entry.name, model, location, Some(&root), options)));
    }

    LevelObjects { root, models }
}

/// A face of an editor mesh with one UV per corner, UV origin in the bottom left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<u32>,
    pub uvs: Vec<Vec2>,
}

/// An editor mesh object that can be exported as a detail model.
pub trait MeshSource {
    fn name(&self) -> &str;
    fn positions(&self) -> &[Vec3];
    fn polygons(&self) -> &[Polygon];
    /// Image used by the object's material.
    fn image_path(&self) -> Option<&Path>;
    /// Texture reference set directly on the object, used when there's no image.
    fn texture_name(&self) -> Option<&str> {
        None
    }
    fn shader(&self) -> Option<&str> {
        None
    }
    fn flags(&self) -> u32 {
        0
    }
    fn scale_range(&self) -> (f32, f32) {
        (1.0, 1.0)
    }
}

/// Derives the texture reference stored in a `.dm` from an image path.
pub fn texture_reference(image: &Path, textures_folder: Option<&Path>, style: TexturePathStyle) -> String {
    let stem = || {
        image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    if style == TexturePathStyle::NameOnly {
        return stem();
    }

    match textures_folder.and_then(|folder| image.strip_prefix(folder).ok()) {
        Some(relative) => relative
            .with_extension("")
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\\"),
        None => stem(),
    }
}

/// Builds a detail model from an editor mesh. Polygons are fan triangulated and vertices are
/// split wherever the corners sharing them have different UVs.
pub fn extract_model<S: MeshSource + ?Sized>(
    source: &S,
    options: &ExportOptions,
) -> StdResult<DetailModel, DetailsError> {
    let texture = match (source.image_path(), source.texture_name()) {
        (Some(image), _) => texture_reference(
            image,
            options.textures_folder.as_deref(),
            options.texture_path_style,
        ),
        (None, Some(name)) => name.to_owned(),
        (None, None) => return Err(DetailsError::MissingTexture(source.name().to_owned())),
    };

    let source_positions = source.positions();
    let mut corners: HashMap<(u32, [u32; 2]), u32> = HashMap::new();
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut triangles = Vec::new();

    for polygon in source.polygons() {
        if polygon.vertices.len() < 3 || polygon.uvs.len() != polygon.vertices.len() {
            return Err(DetailsError::MalformedStream(format!(
                "polygon of \"{}\" has {} corners and {} UVs",
                source.name(),
                polygon.vertices.len(),
                polygon.uvs.len()
            )));
        }

        let mut indices = Vec::with_capacity(polygon.vertices.len());
        for (&v, &uv) in polygon.vertices.iter().zip(&polygon.uvs) {
            let position = *source_positions.get(v as usize).ok_or_else(|| {
                DetailsError::MalformedStream(format!(
                    "polygon of \"{}\" uses vertex {} of {}",
                    source.name(),
                    v,
                    source_positions.len()
                ))
            })?;

            let index = *corners.entry((v, [uv.x.to_bits(), uv.y.to_bits()])).or_insert_with(|| {
                positions.push(position);
                uvs.push(flip_v(uv));
                (positions.len() - 1) as u32
            });
            indices.push(index);
        }

        for i in 1..indices.len() - 1 {
            triangles.push([indices[0], indices[i], indices[i + 1]]);
        }
    }

    let (min_scale, max_scale) = source.scale_range();
    let model = DetailModel {
        positions,
        uvs,
        triangles,
        texture,
        shader: source.shader().unwrap_or(DEFAULT_SHADER).to_owned(),
        flags: source.flags(),
        min_scale,
        max_scale,
    };
    model.validate()?;
    Ok(model)
}

/// One palette entry of an editor level object.
pub struct PaletteSource<'a> {
    pub name: String,
    /// The editor mesh to embed, if the entry has one.
    pub mesh: Option<&'a dyn MeshSource>,
}

/// An editor object holding level details.
pub trait LevelSource {
    fn name(&self) -> &str;
    fn base(&self) -> Vec3;
    fn grid_size(&self) -> (u32, u32);
    fn palette(&self) -> Vec<PaletteSource<'_>>;
    fn slots(&self) -> &[DetailSlot];
}

pub fn extract_level<S: LevelSource + ?Sized>(
    source: &S,
    options: &ExportOptions,
) -> StdResult<LevelDetails, DetailsError> {
    debug!("extracting level details from \"{}\"", source.name());
    let palette = source
        .palette()
        .into_iter()
        .map(|entry| match entry.mesh {
            Some(mesh) => Ok(PaletteEntry::embedded(entry.name, extract_model(mesh, options)?)),
            None => Ok(PaletteEntry::reference(entry.name)),
        })
        .collect::<StdResult<Vec<_>, DetailsError>>()?;

    let (width, height) = source.grid_size();
    Ok(LevelDetails {
        width,
        height,
        base: source.base(),
        palette,
        slots: source.slots().to_vec(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Placement;

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedObject {
        pub name: String,
        pub mesh: Option<usize>,
        pub location: Vec3,
        pub parent: Option<usize>,
    }

    /// Keeps everything it is asked to create.
    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub meshes: Vec<(String, DetailModel, Option<MaterialDesc>)>,
        pub objects: Vec<RecordedObject>,
    }

    impl SceneHost for RecordingHost {
        type Mesh = usize;
        type Object = usize;

        fn create_mesh(&mut self, name: &str, model: &DetailModel) -> usize {
            self.meshes.push((name.to_owned(), model.clone(), None));
            self.meshes.len() - 1
        }

        fn set_material(&mut self, mesh: &mut usize, material: &MaterialDesc) {
            self.meshes[*mesh].2 = Some(material.clone());
        }

        fn create_object(&mut self, name: &str, mesh: Option<usize>, location: Vec3, parent: Option<&usize>) -> usize {
            self.objects.push(RecordedObject {
                name: name.to_owned(),
                mesh,
                location,
                parent: parent.copied(),
            });
            self.objects.len() - 1
        }
    }

    pub struct TestMesh {
        pub name: String,
        pub positions: Vec<Vec3>,
        pub polygons: Vec<Polygon>,
        pub image: Option<PathBuf>,
    }

    impl MeshSource for TestMesh {
        fn name(&self) -> &str {
            &self.name
        }
        fn positions(&self) -> &[Vec3] {
            &self.positions
        }
        fn polygons(&self) -> &[Polygon] {
            &self.polygons
        }
        fn image_path(&self) -> Option<&Path> {
            self.image.as_deref()
        }
    }

    /// A unit quad with a UV seam along its diagonal.
    pub fn seamed_quad() -> TestMesh {
        TestMesh {
            name: "grass".to_owned(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 0.0, 1.0), Vec3::Z],
            polygons: vec![
                Polygon {
                    vertices: vec![0, 1, 2],
                    uvs: vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0)],
                },
                Polygon {
                    vertices: vec![0, 2, 3],
                    uvs: vec![Vec2::new(0.0, 0.0), Vec2::new(0.5, 0.5), Vec2::new(0.0, 1.0)],
                },
            ],
            image: Some(PathBuf::from("/game/textures/detail/grass_a.dds")),
        }
    }

    fn tri(texture: &str, x0: f32, x1: f32) -> DetailModel {
        DetailModel::new(
            vec![Vec3::new(x0, 0.0, 0.0), Vec3::new(x1, 0.0, 0.0), Vec3::new(x0, 0.0, 1.0)],
            vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            vec![[0, 1, 2]],
            texture,
        )
    }

    #[test]
    fn model_gets_material_with_image() {
        let mut host = RecordingHost::default();
        let options = ImportOptions {
            textures_folder: Some(PathBuf::from("/game/textures")),
            ..ImportOptions::default()
        };
        let object = instantiate_model(&mut host, "grass.dm", &tri("detail\\grass_a", 0.0, 1.0), &options);

        assert_eq!(host.objects[object].mesh, Some(0));
        assert_eq!(host.meshes[0].1.uvs, vec![Vec2::Y, Vec2::ONE, Vec2::ZERO]);
        let material = host.meshes[0].2.as_ref().unwrap();
        assert_eq!(material.image, PathBuf::from("/game/textures/detail/grass_a.dds"));
        assert_eq!(material.shader, DEFAULT_SHADER);
    }

    #[test]
    fn palette_is_laid_out_in_a_row() {
        let mut level = LevelDetails::new(
            1,
            1,
            Vec3::new(5.0, 6.0, 7.0),
            vec![
                PaletteEntry::embedded("a.dm", tri("a", -1.0, 1.0)),
                PaletteEntry::reference("b.dm"),
                PaletteEntry::embedded("c.dm", tri("c", 0.0, 3.0)),
            ],
        );
        level.slots[0] = DetailSlot::new(0, Placement::IDENTITY);

        let mut host = RecordingHost::default();
        let objects = instantiate_level(&mut host, "level", &level, &ImportOptions::default());
        assert_eq!(host.objects[objects.root].location, Vec3::new(5.0, 6.0, 7.0));
        assert!(objects.models[1].is_none());

        let a = &host.objects[objects.models[0].unwrap()];
        let c = &host.objects[objects.models[2].unwrap()];
        assert_eq!(a.parent, Some(objects.root));
        assert_eq!(a.location.x, 1.0);
        // a spans 0..2, so c starts at 3
        assert_eq!(c.location.x, 3.0);

        let stacked = ImportOptions {
            models_in_a_row: false,
            ..ImportOptions::default()
        };
        let mut host = RecordingHost::default();
        let objects = instantiate_level(&mut host, "level", &level, &stacked);
        assert_eq!(host.objects[objects.models[2].unwrap()].location, Vec3::ZERO);
    }

    #[test]
    fn texture_reference_styles() {
        let image = Path::new("/game/textures/detail/grass_a.dds");
        let folder = Some(Path::new("/game/textures"));
        assert_eq!(texture_reference(image, folder, TexturePathStyle::Full), "detail\\grass_a");
        assert_eq!(texture_reference(image, folder, TexturePathStyle::NameOnly), "grass_a");
        assert_eq!(
            texture_reference(image, Some(Path::new("/elsewhere")), TexturePathStyle::Full),
            "grass_a"
        );
        assert_eq!(texture_reference(image, None, TexturePathStyle::Full), "grass_a");
    }

    #[test]
    fn seams_split_vertices() {
        let options = ExportOptions {
            textures_folder: Some(PathBuf::from("/game/textures")),
            ..ExportOptions::default()
        };
        let model = extract_model(&seamed_quad(), &options).unwrap();

        // vertex 2 has two different UVs, vertex 0 shares one
        assert_eq!(model.positions.len(), 5);
        assert_eq!(model.triangles, vec![[0, 1, 2], [0, 3, 4]]);
        assert_eq!(model.positions[3], model.positions[2]);
        assert_eq!(model.uvs[3], Vec2::new(0.5, 0.5));
        // stored with the engine's top left origin
        assert_eq!(model.uvs[1], Vec2::new(1.0, 1.0));
        assert_eq!(model.uvs[2], Vec2::new(1.0, 0.0));
        assert_eq!(model.texture, "detail\\grass_a");
    }

    #[test]
    fn polygons_are_fan_triangulated() {
        let mut quad = seamed_quad();
        quad.polygons = vec![Polygon {
            vertices: vec![0, 1, 2, 3],
            uvs: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
        }];
        let model = extract_model(&quad, &ExportOptions::default()).unwrap();
        assert_eq!(model.triangles, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(model.positions.len(), 4);
    }

    #[test]
    fn extraction_errors() {
        let mut no_texture = seamed_quad();
        no_texture.image = None;
        assert!(matches!(
            extract_model(&no_texture, &ExportOptions::default()),
            Err(DetailsError::MissingTexture(name)) if name == "grass"
        ));

        let mut bad_vertex = seamed_quad();
        bad_vertex.polygons[0].vertices[2] = 9;
        assert!(matches!(
            extract_model(&bad_vertex, &ExportOptions::default()),
            Err(DetailsError::MalformedStream(_))
        ));

        let mut empty = seamed_quad();
        empty.polygons.clear();
        assert!(matches!(
            extract_model(&empty, &ExportOptions::default()),
            Err(DetailsError::EmptyMesh)
        ));
    }
}
