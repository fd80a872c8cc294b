use crate::gltf::accessors::{resolve_accessors, resolve_buffer_views};
use crate::gltf::buffers::{load_buffers, BufferSource};
use crate::gltf::document::Document;
use crate::gltf::glb::Glb;
use crate::gltf::meshes::build_meshes;
use crate::gltf::nodes::{build_cameras, select_scene, SceneGraphBuilder};
use crate::gltf::{LoadError, LoaderOptions};
use crate::mesh::Buffer;
use crate::scene::Scene;
use std::rc::Rc;

/// Loads a `.gltf` file. Buffers are fetched from `source` concurrently;
/// everything after that happens synchronously, and either the whole scene
/// is returned or nothing is.
pub async fn load_gltf<S: BufferSource + ?Sized>(
    gltf: &str,
    source: &S,
    options: &LoaderOptions,
) -> Result<Scene, LoadError> {
    let document = Document::parse(gltf)?;
    let buffers = load_buffers(&document.buffers, source, None).await?;
    build_scene(&document, &buffers, options)
}

/// Loads a `.glb` file. The first buffer may be the file's own BIN chunk,
/// any others are fetched from `source`.
pub async fn load_glb<S: BufferSource + ?Sized>(
    glb: &[u8],
    source: &S,
    options: &LoaderOptions,
) -> Result<Scene, LoadError> {
    let glb = Glb::parse(glb)?;
    let document = Document::parse(glb.json)?;
    let buffers = load_buffers(&document.buffers, source, glb.bin).await?;
    build_scene(&document, &buffers, options)
}

fn build_scene(
    document: &Document,
    buffers: &[Rc<Buffer>],
    options: &LoaderOptions,
) -> Result<Scene, LoadError> {
    let buffer_views = resolve_buffer_views(&document.buffer_views, buffers)?;
    let accessors = resolve_accessors(&document.accessors, &buffer_views, options)?;
    let meshes = build_meshes(&document.meshes, &accessors)?;
    let cameras = build_cameras(&document.cameras, options)?;
    let (nodes, parents) = SceneGraphBuilder::new(&document.nodes, &meshes, &cameras).build()?;
    let (name, roots) = select_scene(&document.scenes, document.default_scene, &parents, options)?;

    let mut scene = Scene::from_parts(name, nodes, parents, roots);
    if let Some(camera) = scene.use_first_camera() {
        log::debug!("using camera node {} as the active camera", camera.index());
    }
    log::debug!(
        "loaded glTF {} scene with {} root nodes ({} nodes, {} meshes)",
        document.version,
        scene.root_nodes().len(),
        scene.nodes().len(),
        meshes.len(),
    );
    Ok(scene)
}
