use crate::gltf::document::{AccessorDesc, BufferViewDesc};
use crate::gltf::error::resolve;
use crate::gltf::{LoadError, LoaderOptions};
use crate::mesh::{Accessor, Buffer, BufferTarget, BufferView, ComponentType, ElementType};
use std::rc::Rc;

/// Binds buffer view descriptors to the loaded buffers.
pub fn resolve_buffer_views(
    descs: &[BufferViewDesc],
    buffers: &[Rc<Buffer>],
) -> Result<Vec<Rc<BufferView>>, LoadError> {
    let mut views = Vec::with_capacity(descs.len());
    for (i, desc) in descs.iter().enumerate() {
        let object = || format!("buffer view {i}");
        let buffer = resolve(buffers, desc.buffer, "buffer", object)?;
        let target = match desc.target {
            Some(target) => BufferTarget::from_gl(target as u32)
                .ok_or_else(|| LoadError::invalid(object(), "target"))?,
            None => BufferTarget::VertexData,
        };
        let byte_offset = desc.byte_offset.unwrap_or(0);
        let required = byte_offset.saturating_add(desc.byte_length);
        if required > buffer.byte_length() {
            return Err(LoadError::OutOfBounds {
                object: object(),
                required,
                available: buffer.byte_length(),
            });
        }
        views.push(Rc::new(BufferView {
            buffer: buffer.clone(),
            byte_offset,
            byte_length: desc.byte_length,
            byte_stride: desc.byte_stride.unwrap_or(0),
            target,
        }));
    }
    Ok(views)
}

/// Binds accessor descriptors to the resolved buffer views and checks that
/// every accessor fits inside its view.
pub fn resolve_accessors(
    descs: &[AccessorDesc],
    views: &[Rc<BufferView>],
    options: &LoaderOptions,
) -> Result<Vec<Rc<Accessor>>, LoadError> {
    let mut accessors = Vec::with_capacity(descs.len());
    for (i, desc) in descs.iter().enumerate() {
        let object = || format!("accessor {i}");
        let view_index = match desc.buffer_view {
            Some(view_index) => view_index,
            None if options.accessor_view_fallback => {
                log::warn!("accessor {i} has no bufferView, reading from buffer view 0");
                0
            }
            None => return Err(LoadError::missing(object(), "bufferView")),
        };
        let buffer_view = resolve(views, view_index, "buffer view", object)?;
        let component_type = ComponentType::from_gl(desc.component_type as u32)
            .ok_or_else(|| LoadError::invalid(object(), "componentType"))?;
        let element_type = ElementType::from_token(&desc.element_type)
            .ok_or_else(|| LoadError::invalid(object(), "type"))?;

        let accessor = Accessor {
            buffer_view: buffer_view.clone(),
            byte_offset: desc.byte_offset.unwrap_or(0),
            component_type,
            count: desc.count,
            normalized: desc.normalized.unwrap_or(false),
            element_type,
        };
        if buffer_view.byte_stride != 0 && buffer_view.byte_stride < accessor.element_size() {
            return Err(LoadError::invalid(format!("buffer view {view_index}"), "byteStride"));
        }
        let required = accessor.required_view_length();
        if required > buffer_view.byte_length {
            return Err(LoadError::OutOfBounds {
                object: object(),
                required,
                available: buffer_view.byte_length,
            });
        }
        accessors.push(Rc::new(accessor));
    }
    Ok(accessors)
}
