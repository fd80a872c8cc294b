//! glTF 2.0 loading: JSON (and GLB) in, linked [`Scene`](crate::scene::Scene)
//! out.
//!
//! Loading happens in stages, each consuming only the previous one's output:
//! buffers are fetched, then buffer views and accessors are bound to them,
//! accessors are grouped into meshes, and finally nodes are resolved into a
//! tree. Only the static mesh/node/camera subset of glTF is supported.

mod accessors;
mod buffers;
mod document;
mod error;
mod glb;
mod loader;
mod meshes;
mod nodes;

pub use buffers::{decode_data_uri, BufferSource, DirectorySource, ResourceMap};
pub use error::LoadError;
pub use loader::{load_glb, load_gltf};

/// Which scene to load when the file doesn't name a default one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DefaultScene {
    #[default]
    First,
    Empty,
}

/// Knobs for files that don't quite follow the format. The defaults are
/// strict.
#[derive(Clone, Debug, Default)]
pub struct LoaderOptions {
    /// Read accessors without a `bufferView` from buffer view 0 instead of
    /// failing. Some old exporters rely on this.
    pub accessor_view_fallback: bool,
    /// Replace orthographic cameras with the default perspective camera
    /// instead of failing.
    pub orthographic_fallback: bool,
    pub default_scene: DefaultScene,
}
