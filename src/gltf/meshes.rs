use crate::gltf::document::MeshDesc;
use crate::gltf::error::resolve;
use crate::gltf::LoadError;
use crate::mesh::{Accessor, ElementType, Mesh, MeshPrimitive, PrimitiveAttributes, PrimitiveMode};
use std::rc::Rc;

/// Groups resolved accessors into primitives and meshes. The result is in
/// declaration order, so node descriptors can refer to meshes by index.
pub fn build_meshes(
    descs: &[MeshDesc],
    accessors: &[Rc<Accessor>],
) -> Result<Vec<Rc<Mesh>>, LoadError> {
    let mut meshes = Vec::with_capacity(descs.len());
    for (mesh_index, desc) in descs.iter().enumerate() {
        let mut primitives = Vec::with_capacity(desc.primitives.len());
        for (primitive_index, primitive) in desc.primitives.iter().enumerate() {
            let object = || format!("mesh {mesh_index} primitive {primitive_index}");

            let indices = match primitive.indices {
                Some(index) => {
                    let accessor = resolve(accessors, index, "accessor", object)?;
                    if accessor.element_type != ElementType::Scalar
                        || !accessor.component_type.is_unsigned_integer()
                    {
                        return Err(LoadError::invalid(object(), "indices"));
                    }
                    Some(accessor.clone())
                }
                None => None,
            };

            let mode = match primitive.mode {
                Some(mode) => PrimitiveMode::from_gl(mode as u32)
                    .ok_or_else(|| LoadError::invalid(object(), "mode"))?,
                None => PrimitiveMode::Triangles,
            };

            let mut attributes = PrimitiveAttributes::new();
            for (semantic, accessor_index) in &primitive.attributes {
                let accessor = resolve(accessors, *accessor_index, "accessor", object)?;
                attributes.insert(semantic.clone(), accessor.clone());
            }
            if attributes.is_empty() {
                log::warn!("{} has no attributes and will not be drawn", object());
            }

            primitives.push(MeshPrimitive::new(attributes, indices, mode));
        }
        log::debug!(
            "built mesh {mesh_index} ({:?}) with {} primitives",
            desc.name,
            primitives.len()
        );
        meshes.push(Rc::new(Mesh {
            primitives,
            name: desc.name.clone(),
        }));
    }
    Ok(meshes)
}
