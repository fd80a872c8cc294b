//! Loads glTF 2.0 scenes into a node tree and renders them through a
//! pluggable, caching render backend.
//!
//! ```no_run
//! use futures::executor::block_on;
//! use gltf_scene::gltf::{load_gltf, DirectorySource, LoaderOptions};
//!
//! let json = std::fs::read_to_string("models/box/box.gltf")?;
//! let source = DirectorySource::new("models/box");
//! let scene = block_on(load_gltf(&json, &source, &LoaderOptions::default()))?;
//! for (node, world_matrix) in scene.traverse() {
//!     println!("{:?}: {}", scene.node(node).name, world_matrix);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod gltf;
pub mod mesh;
pub mod renderer;
pub mod scene;

pub use gltf::{load_glb, load_gltf, LoadError, LoaderOptions};
pub use renderer::{CachingBackend, RenderBackend, RenderError};
pub use scene::{ActiveCamera, Camera, NodeId, Scene, Viewport};
