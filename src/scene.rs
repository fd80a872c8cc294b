//! The loaded node tree and the per-frame traversal that feeds a
//! [`RenderBackend`].
//!
//! Nodes live in an arena owned by the [`Scene`], indexed by [`NodeId`]
//! (the node's index in the source file). Children are owned through the
//! arena, and upward traversal goes through a separate parent table, so
//! there are no reference cycles to worry about.

use crate::mesh::Mesh;
use crate::renderer::{RenderBackend, RenderError};
use glam::{Mat4, Vec4};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> NodeId {
        NodeId(index)
    }

    /// The index of the node in the file it was loaded from.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Perspective lens parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Vertical field of view, in degrees.
    pub field_of_view: f32,
    pub near: f32,
    /// `None` is an infinitely far away far plane.
    pub far: Option<f32>,
}

impl Camera {
    pub const DEFAULT_FIELD_OF_VIEW: f32 = 60.0;
    pub const DEFAULT_NEAR: f32 = 0.05;

    /// OpenGL-style (-1..1 depth) perspective projection.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        let fov_y = self.field_of_view.to_radians();
        match self.far {
            Some(far) => Mat4::perspective_rh_gl(fov_y, aspect_ratio, self.near, far),
            None => {
                let f = 1.0 / (fov_y / 2.0).tan();
                Mat4::from_cols(
                    Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
                    Vec4::new(0.0, f, 0.0, 0.0),
                    Vec4::new(0.0, 0.0, -1.0, -1.0),
                    Vec4::new(0.0, 0.0, -2.0 * self.near, 0.0),
                )
            }
        }
    }
}

impl Default for Camera {
    fn default() -> Camera {
        Camera {
            field_of_view: Camera::DEFAULT_FIELD_OF_VIEW,
            near: Camera::DEFAULT_NEAR,
            far: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Plain,
    Camera(Camera),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: Option<String>,
    pub mesh: Option<Rc<Mesh>>,
    pub children: Vec<NodeId>,
    /// Local transform, relative to the parent.
    pub transform: Mat4,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn camera(&self) -> Option<&Camera> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            NodeKind::Plain => None,
        }
    }
}

/// Where the scene is viewed from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActiveCamera {
    /// A node of the tree. If it isn't a camera node, it is looked through
    /// with the default lens.
    Node(NodeId),
    /// A camera that isn't part of the tree, placed with its own world
    /// transform.
    Detached { camera: Camera, transform: Mat4 },
}

impl Default for ActiveCamera {
    fn default() -> ActiveCamera {
        ActiveCamera::Detached {
            camera: Camera::default(),
            transform: Mat4::IDENTITY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// None for degenerate (zero-sized) viewports.
    pub fn aspect_ratio(&self) -> Option<f32> {
        (self.width > 0 && self.height > 0).then(|| self.width as f32 / self.height as f32)
    }
}

pub struct Scene {
    pub name: Option<String>,
    /// Local transform of the synthetic root node all top-level nodes hang
    /// off of. This is the one part of the tree meant to be changed between
    /// frames.
    pub root_transform: Mat4,
    /// When set, the projection matrix is recalculated from the active
    /// camera every frame.
    pub viewport: Option<Viewport>,
    nodes: Vec<SceneNode>,
    parents: Vec<Option<NodeId>>,
    roots: Vec<NodeId>,
    active_camera: ActiveCamera,
    backend: Option<Rc<RefCell<dyn RenderBackend>>>,
}

impl Scene {
    pub fn empty() -> Scene {
        Scene::from_parts(None, Vec::new(), Vec::new(), Vec::new())
    }

    /// Expects `parents` to be consistent with the nodes' child lists, and
    /// `roots` to be parentless.
    pub(crate) fn from_parts(
        name: Option<String>,
        nodes: Vec<SceneNode>,
        parents: Vec<Option<NodeId>>,
        roots: Vec<NodeId>,
    ) -> Scene {
        debug_assert_eq!(nodes.len(), parents.len());
        Scene {
            name,
            root_transform: Mat4::IDENTITY,
            viewport: None,
            nodes,
            parents,
            roots,
            active_camera: ActiveCamera::default(),
            backend: None,
        }
    }

    /// Every node loaded from the file, including ones not reachable from
    /// this scene's roots.
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// Panics if the id is from another scene with fewer nodes.
    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn root_nodes(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.0]
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name.as_deref() == Some(name))
            .map(NodeId)
    }

    pub fn attach_backend(&mut self, backend: Rc<RefCell<dyn RenderBackend>>) {
        self.backend = Some(backend);
    }

    pub fn detach_backend(&mut self) -> Option<Rc<RefCell<dyn RenderBackend>>> {
        self.backend.take()
    }

    pub fn active_camera(&self) -> &ActiveCamera {
        &self.active_camera
    }

    /// Fails for a node id that doesn't belong to this scene, the camera is
    /// left as it was then.
    pub fn set_active_camera(&mut self, camera: ActiveCamera) -> Result<(), RenderError> {
        if let ActiveCamera::Node(id) = camera {
            if id.0 >= self.nodes.len() {
                return Err(RenderError::UnknownNode(id.0));
            }
        }
        self.active_camera = camera;
        Ok(())
    }

    /// Makes the first camera node in pre-order the active camera, if there
    /// is one.
    pub(crate) fn use_first_camera(&mut self) -> Option<NodeId> {
        let camera = self.find_first_camera()?;
        self.active_camera = ActiveCamera::Node(camera);
        Some(camera)
    }

    /// The lens of the active camera.
    pub fn camera(&self) -> Camera {
        match &self.active_camera {
            ActiveCamera::Node(id) => self.nodes[id.0].camera().copied().unwrap_or_default(),
            ActiveCamera::Detached { camera, .. } => *camera,
        }
    }

    /// The node's local transform composed with all of its ancestors'. The
    /// root transform only applies to nodes that hang off this scene's roots.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut world = self.nodes[id.0].transform;
        let mut topmost = id;
        while let Some(parent) = self.parents[topmost.0] {
            world = self.nodes[parent.0].transform * world;
            topmost = parent;
        }
        if self.roots.contains(&topmost) {
            world = self.root_transform * world;
        }
        world
    }

    pub fn view_matrix(&self) -> Mat4 {
        let camera_world = match &self.active_camera {
            ActiveCamera::Node(id) => self.world_matrix(*id),
            ActiveCamera::Detached { transform, .. } => *transform,
        };
        camera_world.inverse()
    }

    /// Pre-order, depth-first walk of the tree, children in declaration
    /// order, yielding each node with its world matrix.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            scene: self,
            node_stack: self
                .roots
                .iter()
                .rev()
                .map(|&id| (self.root_transform, id))
                .collect(),
        }
    }

    /// The first camera node in pre-order, if any.
    pub fn find_first_camera(&self) -> Option<NodeId> {
        self.traverse()
            .map(|(id, _)| id)
            .find(|&id| self.nodes[id.0].camera().is_some())
    }

    /// Draws the scene with the attached backend. Does nothing without one.
    pub fn render(&self) -> Result<(), RenderError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let mut backend = backend
            .try_borrow_mut()
            .map_err(|_| RenderError::BackendBusy)?;
        if let Some(aspect_ratio) = self.viewport.and_then(|viewport| viewport.aspect_ratio()) {
            backend.set_projection_matrix(self.camera().projection_matrix(aspect_ratio));
        }
        backend.set_view_matrix(self.view_matrix());
        backend.clear();
        for (id, world_matrix) in self.traverse() {
            if let Some(mesh) = &self.nodes[id.0].mesh {
                backend.render(mesh, &world_matrix)?;
            }
        }
        Ok(())
    }

    /// Releases the backend's GPU resources for every mesh in the tree. The
    /// tree itself is left as is, so the scene can still be rendered (and
    /// the resources recreated) afterwards.
    pub fn destroy(&self) -> Result<(), RenderError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let mut backend = backend
            .try_borrow_mut()
            .map_err(|_| RenderError::BackendBusy)?;
        for (id, _) in self.traverse() {
            if let Some(mesh) = &self.nodes[id.0].mesh {
                backend.destroy_mesh(mesh);
            }
        }
        Ok(())
    }
}

pub struct Traverse<'a> {
    scene: &'a Scene,
    node_stack: Vec<(Mat4, NodeId)>,
}

impl Iterator for Traverse<'_> {
    type Item = (NodeId, Mat4);

    fn next(&mut self) -> Option<(NodeId, Mat4)> {
        let (parent_transform, id) = self.node_stack.pop()?;
        let node = &self.scene.nodes[id.0];
        let transform = parent_transform * node.transform;
        // Reversed, so that the first child is popped first.
        self.node_stack
            .extend(node.children.iter().rev().map(|&child| (transform, child)));
        Some((id, transform))
    }
}
