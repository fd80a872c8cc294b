//! The drawing side: the [`RenderBackend`] interface the scene renders
//! through, a GPU resource cache implementing it over any [`GpuDevice`], and
//! the OpenGL ES 3.0 device.

use crate::mesh::Mesh;
use glam::Mat4;

mod cache;
pub(crate) mod gl;
mod gl_device;
pub mod program;

pub use cache::{AttributeLayout, CachingBackend, GpuDevice};
pub use gl_device::GlDevice;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("could not create {0}")]
    ResourceCreation(&'static str),
    #[error("shader error: {0}")]
    Shader(String),
    #[error("the render backend is already being used by another traversal")]
    BackendBusy,
    #[error("node {0} is not part of this scene")]
    UnknownNode(usize),
}

/// Counters since the last [`RenderBackend::clear`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: usize,
    /// Primitives whose GPU resources were built.
    pub primitives: usize,
    pub vertex_buffers: usize,
    pub index_buffers: usize,
}

/// Something that can draw meshes. Implementations are expected to create
/// GPU resources lazily on first render and keep them until the mesh is
/// destroyed.
pub trait RenderBackend {
    fn render(&mut self, mesh: &Mesh, world_matrix: &Mat4) -> Result<(), RenderError>;
    /// Releases the GPU resources of the mesh's primitives. Meshes that were
    /// never rendered are ignored.
    fn destroy_mesh(&mut self, mesh: &Mesh);
    /// Clears the frame and resets the stats.
    fn clear(&mut self);
    fn view_matrix(&self) -> Mat4;
    fn set_view_matrix(&mut self, view: Mat4);
    fn projection_matrix(&self) -> Mat4;
    fn set_projection_matrix(&mut self, projection: Mat4);
    fn stats(&self) -> RenderStats;
}
