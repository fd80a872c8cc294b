use crate::gltf::document::{CameraDesc, NodeDesc, SceneDesc};
use crate::gltf::error::resolve;
use crate::gltf::{DefaultScene, LoadError, LoaderOptions};
use crate::mesh::Mesh;
use crate::scene::{Camera, NodeId, NodeKind, SceneNode};
use glam::{Mat4, Quat, Vec3};
use std::rc::Rc;

pub fn build_cameras(descs: &[CameraDesc], options: &LoaderOptions) -> Result<Vec<Camera>, LoadError> {
    let mut cameras = Vec::with_capacity(descs.len());
    for (i, desc) in descs.iter().enumerate() {
        let camera = match desc {
            CameraDesc::Perspective { yfov, znear, zfar } => {
                let mut camera = Camera::default();
                if let Some(yfov) = yfov {
                    camera.field_of_view = yfov.to_degrees();
                }
                if let Some(znear) = znear {
                    camera.near = *znear;
                }
                if zfar.is_some() {
                    camera.far = *zfar;
                }
                camera
            }
            CameraDesc::Orthographic if options.orthographic_fallback => {
                log::warn!("camera {i} is orthographic, using the default perspective camera instead");
                Camera::default()
            }
            CameraDesc::Orthographic => {
                return Err(LoadError::Unsupported(format!("orthographic camera {i}")));
            }
        };
        cameras.push(camera);
    }
    Ok(cameras)
}

/// The explicit matrix if there is one, otherwise translation * rotation *
/// scale, with missing components left out.
pub fn local_transform(desc: &NodeDesc) -> Mat4 {
    if let Some(matrix) = &desc.matrix {
        return Mat4::from_cols_array(matrix);
    }
    if desc.translation.is_none() && desc.rotation.is_none() && desc.scale.is_none() {
        return Mat4::IDENTITY;
    }
    let translation = desc.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO);
    let rotation = desc.rotation.map(Quat::from_array).unwrap_or(Quat::IDENTITY);
    let scale = desc.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE);
    Mat4::from_scale_rotation_translation(scale, rotation, translation)
}

/// Turns node descriptors into a tree of [`SceneNode`]s, one per descriptor.
///
/// Nodes are materialized depth-first with an explicit stack and memoized by
/// index, so a child declared before its parent is built once and then just
/// attached, and hierarchy depth is bounded by memory rather than the call
/// stack. A node that is reached again while it's still on the stack is a
/// cycle, and a node that gets attached a second time has two parents; both
/// are errors.
pub struct SceneGraphBuilder<'a> {
    descs: &'a [NodeDesc],
    meshes: &'a [Rc<Mesh>],
    cameras: &'a [Camera],
    slots: Vec<Option<SceneNode>>,
    in_progress: Vec<bool>,
    parents: Vec<Option<NodeId>>,
}

impl<'a> SceneGraphBuilder<'a> {
    pub fn new(
        descs: &'a [NodeDesc],
        meshes: &'a [Rc<Mesh>],
        cameras: &'a [Camera],
    ) -> SceneGraphBuilder<'a> {
        SceneGraphBuilder {
            descs,
            meshes,
            cameras,
            slots: vec![None; descs.len()],
            in_progress: vec![false; descs.len()],
            parents: vec![None; descs.len()],
        }
    }

    /// Returns the nodes in descriptor order along with the parent table.
    pub fn build(mut self) -> Result<(Vec<SceneNode>, Vec<Option<NodeId>>), LoadError> {
        for index in 0..self.descs.len() {
            self.materialize(index)?;
        }
        let nodes = self.slots.into_iter().flatten().collect::<Vec<_>>();
        debug_assert_eq!(nodes.len(), self.parents.len());
        log::debug!("materialized {} nodes", nodes.len());
        Ok((nodes, self.parents))
    }

    fn materialize(&mut self, root: usize) -> Result<(), LoadError> {
        if self.slots[root].is_some() {
            return Ok(());
        }
        let descs = self.descs;
        // (node, position of the next child to visit)
        let mut stack = vec![(root, 0)];
        self.in_progress[root] = true;

        while let Some(frame) = stack.last_mut() {
            let (index, position) = *frame;
            if let Some(&child) = descs[index].children.get(position) {
                frame.1 += 1;
                resolve(descs, child, "node", || format!("node {index}"))?;
                if self.slots[child].is_some() {
                    self.attach(index, child)?;
                } else if self.in_progress[child] {
                    return Err(LoadError::CyclicNodeReference(child));
                } else {
                    self.in_progress[child] = true;
                    stack.push((child, 0));
                }
                continue;
            }

            stack.pop();
            self.finish(index)?;
            if let Some(&(parent, _)) = stack.last() {
                self.attach(parent, index)?;
            }
        }
        Ok(())
    }

    /// Fills the slot of a node whose children have all been built.
    fn finish(&mut self, index: usize) -> Result<(), LoadError> {
        let descs = self.descs;
        let desc = &descs[index];
        let object = || format!("node {index}");
        let mesh = match desc.mesh {
            Some(mesh) => Some(resolve(self.meshes, mesh, "mesh", object)?.clone()),
            None => None,
        };
        let kind = match desc.camera {
            Some(camera) => NodeKind::Camera(*resolve(self.cameras, camera, "camera", object)?),
            None => NodeKind::Plain,
        };

        self.in_progress[index] = false;
        self.slots[index] = Some(SceneNode {
            name: desc.name.clone(),
            mesh,
            children: desc.children.iter().map(|&child| NodeId::new(child)).collect(),
            transform: local_transform(desc),
            kind,
        });
        Ok(())
    }

    fn attach(&mut self, parent: usize, child: usize) -> Result<(), LoadError> {
        if self.parents[child].is_some() {
            return Err(LoadError::MultipleParents(child));
        }
        self.parents[child] = Some(NodeId::new(parent));
        Ok(())
    }
}

/// Checks every scene's root list and returns the name and roots of the one
/// that should be loaded.
pub fn select_scene(
    descs: &[SceneDesc],
    default_scene: Option<usize>,
    parents: &[Option<NodeId>],
    options: &LoaderOptions,
) -> Result<(Option<String>, Vec<NodeId>), LoadError> {
    let mut scenes = Vec::with_capacity(descs.len());
    for (i, desc) in descs.iter().enumerate() {
        let mut roots: Vec<NodeId> = Vec::with_capacity(desc.nodes.len());
        for &node in &desc.nodes {
            resolve(parents, node, "node", || format!("scene {i}"))?;
            if parents[node].is_some() || roots.contains(&NodeId::new(node)) {
                return Err(LoadError::MultipleParents(node));
            }
            roots.push(NodeId::new(node));
        }
        scenes.push(roots);
    }

    let selected = match default_scene {
        Some(index) => {
            resolve(descs, index, "scene", || "glTF file".to_string())?;
            Some(index)
        }
        None => match options.default_scene {
            DefaultScene::First if !descs.is_empty() => Some(0),
            DefaultScene::First | DefaultScene::Empty => None,
        },
    };
    Ok(match selected {
        Some(index) => (descs[index].name.clone(), scenes.swap_remove(index)),
        None => (None, Vec::new()),
    })
}
