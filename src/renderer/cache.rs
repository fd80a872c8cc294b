use crate::mesh::{Accessor, Buffer, BufferTarget, ComponentType, Mesh, MeshPrimitive, PrimitiveMode, ResourceId};
use crate::renderer::{RenderBackend, RenderError, RenderStats};
use glam::Mat4;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// How one vertex attribute is read out of its vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeLayout {
    pub components: usize,
    pub component_type: ComponentType,
    pub normalized: bool,
    /// 0 for tightly packed.
    pub stride: usize,
    /// From the start of the whole buffer.
    pub offset: usize,
}

impl AttributeLayout {
    pub fn of(accessor: &Accessor) -> AttributeLayout {
        AttributeLayout {
            components: accessor.element_type.component_count(),
            component_type: accessor.component_type,
            normalized: accessor.normalized,
            stride: accessor.buffer_view.byte_stride,
            offset: accessor.buffer_offset(),
        }
    }
}

/// The graphics API operations the resource cache is built on.
///
/// Attribute pointers and index buffer bindings apply to the currently bound
/// vertex array, like they do in OpenGL.
pub trait GpuDevice {
    type Buffer: Copy;
    type VertexArray: Copy;

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> Result<Self::Buffer, RenderError>;
    fn delete_buffer(&mut self, buffer: Self::Buffer);
    fn create_vertex_array(&mut self) -> Result<Self::VertexArray, RenderError>;
    fn delete_vertex_array(&mut self, vertex_array: Self::VertexArray);
    fn bind_vertex_array(&mut self, vertex_array: Option<Self::VertexArray>);
    /// The shader input location for an attribute semantic like `POSITION`.
    fn attribute_location(&self, semantic: &str) -> Option<u32>;
    fn vertex_attrib_pointer(&mut self, location: u32, buffer: Self::Buffer, layout: AttributeLayout);
    fn bind_index_buffer(&mut self, buffer: Self::Buffer);
    fn set_transforms(&mut self, world: &Mat4, view: &Mat4, projection: &Mat4);
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize);
    fn draw_elements(&mut self, mode: PrimitiveMode, count: usize, index_type: ComponentType, offset: usize);
    fn clear(&mut self);
}

struct CachedVertexBuffer<B> {
    buffer: B,
    /// Primitives with an attribute pointer into this buffer.
    users: HashSet<ResourceId>,
}

struct CachedPrimitive<D: GpuDevice> {
    vertex_array: D::VertexArray,
    index_buffer: Option<D::Buffer>,
    /// Source buffer ids of the vertex buffers this primitive uses.
    vertex_buffers: Vec<ResourceId>,
}

/// A [`RenderBackend`] that uploads mesh data to the device the first time
/// it's rendered and reuses it afterwards.
///
/// Each source [`Buffer`] becomes one vertex buffer, shared by all the
/// primitives reading from it. Each primitive gets its own vertex array, and
/// if it's indexed, its own index buffer holding the index view's bytes.
pub struct CachingBackend<D: GpuDevice> {
    device: D,
    view: Mat4,
    projection: Mat4,
    stats: RenderStats,
    vertex_buffers: HashMap<ResourceId, CachedVertexBuffer<D::Buffer>>,
    primitives: HashMap<ResourceId, CachedPrimitive<D>>,
}

impl<D: GpuDevice> CachingBackend<D> {
    pub fn new(device: D) -> CachingBackend<D> {
        CachingBackend {
            device,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            stats: RenderStats::default(),
            vertex_buffers: HashMap::new(),
            primitives: HashMap::new(),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// How many vertex buffers are currently resident.
    pub fn cached_vertex_buffers(&self) -> usize {
        self.vertex_buffers.len()
    }

    /// How many primitives currently have GPU resources.
    pub fn cached_primitives(&self) -> usize {
        self.primitives.len()
    }

    fn build_primitive(&mut self, primitive: &MeshPrimitive) -> Result<(), RenderError> {
        let id = primitive.id();
        let vertex_array = self.device.create_vertex_array()?;
        self.primitives.insert(
            id,
            CachedPrimitive {
                vertex_array,
                index_buffer: None,
                vertex_buffers: Vec::new(),
            },
        );
        self.device.bind_vertex_array(Some(vertex_array));
        let result = self.build_primitive_resources(primitive);
        self.device.bind_vertex_array(None);
        if result.is_err() {
            self.release_primitive(id);
        } else {
            self.stats.primitives += 1;
        }
        result
    }

    /// Expects the primitive's vertex array to be bound and its cache entry
    /// to exist.
    fn build_primitive_resources(&mut self, primitive: &MeshPrimitive) -> Result<(), RenderError> {
        let id = primitive.id();
        for (semantic, accessor) in &primitive.attributes {
            let Some(location) = self.device.attribute_location(semantic) else {
                log::warn!("skipping vertex attribute {semantic}, the shader has no input for it");
                continue;
            };
            let source = &accessor.buffer_view.buffer;
            let buffer = self.acquire_vertex_buffer(source, id)?;
            if let Some(cached) = self.primitives.get_mut(&id) {
                if !cached.vertex_buffers.contains(&source.id()) {
                    cached.vertex_buffers.push(source.id());
                }
            }
            self.device
                .vertex_attrib_pointer(location, buffer, AttributeLayout::of(accessor));
        }

        if let Some(indices) = &primitive.indices {
            let index_buffer = self
                .device
                .create_buffer(BufferTarget::IndexData, indices.buffer_view.bytes())?;
            self.stats.index_buffers += 1;
            if let Some(cached) = self.primitives.get_mut(&id) {
                cached.index_buffer = Some(index_buffer);
            }
            self.device.bind_index_buffer(index_buffer);
        }
        log::debug!("created GPU resources for primitive {id}");
        Ok(())
    }

    fn acquire_vertex_buffer(&mut self, source: &Buffer, user: ResourceId) -> Result<D::Buffer, RenderError> {
        if let Some(cached) = self.vertex_buffers.get_mut(&source.id()) {
            cached.users.insert(user);
            return Ok(cached.buffer);
        }
        let buffer = self
            .device
            .create_buffer(BufferTarget::VertexData, source.data())?;
        self.stats.vertex_buffers += 1;
        log::debug!(
            "uploaded buffer {} ({} bytes) as a vertex buffer",
            source.id(),
            source.byte_length(),
        );
        self.vertex_buffers.insert(
            source.id(),
            CachedVertexBuffer {
                buffer,
                users: HashSet::from([user]),
            },
        );
        Ok(buffer)
    }

    fn release_primitive(&mut self, id: ResourceId) {
        let Some(cached) = self.primitives.remove(&id) else {
            return;
        };
        self.device.delete_vertex_array(cached.vertex_array);
        if let Some(index_buffer) = cached.index_buffer {
            self.device.delete_buffer(index_buffer);
        }
        for source in cached.vertex_buffers {
            if let Entry::Occupied(mut entry) = self.vertex_buffers.entry(source) {
                entry.get_mut().users.remove(&id);
                if entry.get().users.is_empty() {
                    self.device.delete_buffer(entry.remove().buffer);
                    log::debug!("released vertex buffer for buffer {source}");
                }
            }
        }
        log::debug!("released GPU resources of primitive {id}");
    }
}

impl<D: GpuDevice> RenderBackend for CachingBackend<D> {
    fn render(&mut self, mesh: &Mesh, world_matrix: &Mat4) -> Result<(), RenderError> {
        self.device
            .set_transforms(world_matrix, &self.view, &self.projection);
        for primitive in &mesh.primitives {
            if !self.primitives.contains_key(&primitive.id()) {
                self.build_primitive(primitive)?;
            }
            let Some(cached) = self.primitives.get(&primitive.id()) else {
                continue;
            };
            let vertex_array = cached.vertex_array;
            match &primitive.indices {
                Some(indices) => {
                    self.device.bind_vertex_array(Some(vertex_array));
                    self.device.draw_elements(
                        primitive.mode,
                        indices.count,
                        indices.component_type,
                        indices.byte_offset,
                    );
                }
                None => {
                    let Some(count) = primitive.vertex_count() else {
                        continue;
                    };
                    self.device.bind_vertex_array(Some(vertex_array));
                    self.device.draw_arrays(primitive.mode, 0, count);
                }
            }
            self.stats.draw_calls += 1;
        }
        self.device.bind_vertex_array(None);
        Ok(())
    }

    fn destroy_mesh(&mut self, mesh: &Mesh) {
        for primitive in &mesh.primitives {
            self.release_primitive(primitive.id());
        }
    }

    fn clear(&mut self) {
        self.device.clear();
        self.stats = RenderStats::default();
    }

    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn set_view_matrix(&mut self, view: Mat4) {
        self.view = view;
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    fn stats(&self) -> RenderStats {
        self.stats
    }
}

impl<D: GpuDevice> Drop for CachingBackend<D> {
    fn drop(&mut self) {
        for (_, cached) in self.primitives.drain() {
            self.device.delete_vertex_array(cached.vertex_array);
            if let Some(index_buffer) = cached.index_buffer {
                self.device.delete_buffer(index_buffer);
            }
        }
        for (_, cached) in self.vertex_buffers.drain() {
            self.device.delete_buffer(cached.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{BufferView, ElementType, PrimitiveAttributes};
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateBuffer(u32, BufferTarget, Vec<u8>),
        DeleteBuffer(u32),
        CreateVertexArray(u32),
        DeleteVertexArray(u32),
        AttribPointer(u32, u32, AttributeLayout),
        BindIndexBuffer(u32),
        DrawArrays(usize),
        DrawElements(usize, ComponentType, usize),
    }

    #[derive(Default)]
    struct CountingDevice {
        next_name: u32,
        calls: Vec<Call>,
        fail_vertex_arrays: bool,
    }

    impl CountingDevice {
        fn live_buffers(&self) -> usize {
            self.count(|call| matches!(call, Call::CreateBuffer(..)))
                - self.count(|call| matches!(call, Call::DeleteBuffer(..)))
        }

        fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|call| predicate(call)).count()
        }
    }

    impl GpuDevice for CountingDevice {
        type Buffer = u32;
        type VertexArray = u32;

        fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> Result<u32, RenderError> {
            self.next_name += 1;
            self.calls
                .push(Call::CreateBuffer(self.next_name, target, data.to_vec()));
            Ok(self.next_name)
        }

        fn delete_buffer(&mut self, buffer: u32) {
            self.calls.push(Call::DeleteBuffer(buffer));
        }

        fn create_vertex_array(&mut self) -> Result<u32, RenderError> {
            if self.fail_vertex_arrays {
                return Err(RenderError::ResourceCreation("vertex array"));
            }
            self.next_name += 1;
            self.calls.push(Call::CreateVertexArray(self.next_name));
            Ok(self.next_name)
        }

        fn delete_vertex_array(&mut self, vertex_array: u32) {
            self.calls.push(Call::DeleteVertexArray(vertex_array));
        }

        fn bind_vertex_array(&mut self, _: Option<u32>) {}

        fn attribute_location(&self, semantic: &str) -> Option<u32> {
            match semantic {
                "POSITION" => Some(0),
                "NORMAL" => Some(1),
                _ => None,
            }
        }

        fn vertex_attrib_pointer(&mut self, location: u32, buffer: u32, layout: AttributeLayout) {
            self.calls.push(Call::AttribPointer(location, buffer, layout));
        }

        fn bind_index_buffer(&mut self, buffer: u32) {
            self.calls.push(Call::BindIndexBuffer(buffer));
        }

        fn set_transforms(&mut self, _: &Mat4, _: &Mat4, _: &Mat4) {}

        fn draw_arrays(&mut self, _: PrimitiveMode, first: usize, count: usize) {
            assert_eq!(first, 0);
            self.calls.push(Call::DrawArrays(count));
        }

        fn draw_elements(&mut self, _: PrimitiveMode, count: usize, index_type: ComponentType, offset: usize) {
            self.calls.push(Call::DrawElements(count, index_type, offset));
        }

        fn clear(&mut self) {}
    }

    fn view(buffer: &Rc<Buffer>, byte_offset: usize, byte_length: usize, byte_stride: usize) -> Rc<BufferView> {
        Rc::new(BufferView {
            buffer: buffer.clone(),
            byte_offset,
            byte_length,
            byte_stride,
            target: BufferTarget::VertexData,
        })
    }

    fn accessor(view: &Rc<BufferView>, byte_offset: usize, component_type: ComponentType, count: usize, element_type: ElementType) -> Rc<Accessor> {
        Rc::new(Accessor {
            buffer_view: view.clone(),
            byte_offset,
            component_type,
            count,
            normalized: false,
            element_type,
        })
    }

    fn primitive(attributes: &[(&str, &Rc<Accessor>)], indices: Option<&Rc<Accessor>>) -> MeshPrimitive {
        let attributes: PrimitiveAttributes = attributes
            .iter()
            .map(|(semantic, accessor)| (semantic.to_string(), Rc::clone(accessor)))
            .collect();
        MeshPrimitive::new(attributes, indices.cloned(), PrimitiveMode::Triangles)
    }

    fn mesh(primitives: Vec<MeshPrimitive>) -> Mesh {
        Mesh { primitives, name: None }
    }

    fn vertex_buffer() -> Rc<Buffer> {
        Rc::new(Buffer::new(vec![0; 96], None))
    }

    #[test]
    fn resources_are_created_once() {
        let buffer = vertex_buffer();
        let positions = accessor(&view(&buffer, 0, 36, 0), 0, ComponentType::Float, 3, ElementType::Vec3);
        let mesh = mesh(vec![primitive(&[("POSITION", &positions)], None)]);
        let mut backend = CachingBackend::new(CountingDevice::default());

        backend.render(&mesh, &Mat4::IDENTITY).unwrap();
        assert_eq!(
            backend.stats(),
            RenderStats {
                draw_calls: 1,
                primitives: 1,
                vertex_buffers: 1,
                index_buffers: 0,
            }
        );
        backend.clear();
        backend.render(&mesh, &Mat4::IDENTITY).unwrap();
        assert_eq!(
            backend.stats(),
            RenderStats {
                draw_calls: 1,
                ..RenderStats::default()
            }
        );
        assert_eq!(backend.device().count(|c| matches!(c, Call::CreateBuffer(..))), 1);
        assert_eq!(backend.device().count(|c| matches!(c, Call::DrawArrays(3))), 2);
    }

    #[test]
    fn whole_buffer_is_uploaded_with_view_and_accessor_offsets() {
        let buffer = vertex_buffer();
        let positions = accessor(&view(&buffer, 16, 64, 24), 8, ComponentType::Float, 2, ElementType::Vec3);
        let mesh = mesh(vec![primitive(&[("POSITION", &positions)], None)]);
        let mut backend = CachingBackend::new(CountingDevice::default());
        backend.render(&mesh, &Mat4::IDENTITY).unwrap();

        let calls = &backend.device().calls;
        assert!(matches!(&calls[0], Call::CreateVertexArray(_)));
        assert_eq!(calls[1], Call::CreateBuffer(2, BufferTarget::VertexData, vec![0; 96]));
        assert_eq!(
            calls[2],
            Call::AttribPointer(
                0,
                2,
                AttributeLayout {
                    components: 3,
                    component_type: ComponentType::Float,
                    normalized: false,
                    stride: 24,
                    offset: 24,
                }
            )
        );
    }

    #[test]
    fn indexed_draws_use_the_index_accessor() {
        let buffer = Rc::new(Buffer::new((0..48).collect(), None));
        let positions = accessor(&view(&buffer, 0, 36, 0), 0, ComponentType::Float, 3, ElementType::Vec3);
        let indices = accessor(&view(&buffer, 36, 12, 0), 2, ComponentType::UnsignedShort, 3, ElementType::Scalar);
        let mesh = mesh(vec![primitive(&[("POSITION", &positions)], Some(&indices))]);
        let mut backend = CachingBackend::new(CountingDevice::default());
        backend.render(&mesh, &Mat4::IDENTITY).unwrap();

        let device = backend.device();
        assert!(device.calls.contains(&Call::CreateBuffer(
            3,
            BufferTarget::IndexData,
            (36..48).collect()
        )));
        assert!(device.calls.contains(&Call::BindIndexBuffer(3)));
        assert!(device.calls.contains(&Call::DrawElements(3, ComponentType::UnsignedShort, 2)));
        assert_eq!(backend.stats().index_buffers, 1);
    }

    #[test]
    fn unknown_semantics_are_skipped() {
        let buffer = vertex_buffer();
        let positions = accessor(&view(&buffer, 0, 36, 0), 0, ComponentType::Float, 3, ElementType::Vec3);
        let other = Rc::new(Buffer::new(vec![0; 32], None));
        let joints = accessor(&view(&other, 0, 32, 0), 0, ComponentType::UnsignedByte, 3, ElementType::Vec4);
        let mesh = mesh(vec![primitive(&[("POSITION", &positions), ("JOINTS_0", &joints)], None)]);
        let mut backend = CachingBackend::new(CountingDevice::default());
        backend.render(&mesh, &Mat4::IDENTITY).unwrap();

        assert_eq!(backend.cached_vertex_buffers(), 1);
        assert_eq!(backend.device().count(|c| matches!(c, Call::AttribPointer(..))), 1);
        assert_eq!(backend.device().count(|c| matches!(c, Call::DrawArrays(3))), 1);
    }

    #[test]
    fn shared_vertex_buffer_lives_until_its_last_primitive_is_destroyed() {
        let buffer = vertex_buffer();
        let shared = view(&buffer, 0, 96, 0);
        let a = accessor(&shared, 0, ComponentType::Float, 3, ElementType::Vec3);
        let b = accessor(&shared, 36, ComponentType::Float, 3, ElementType::Vec3);
        let normals = accessor(&shared, 72, ComponentType::Float, 2, ElementType::Vec3);
        let first = mesh(vec![primitive(&[("POSITION", &a), ("NORMAL", &normals)], None)]);
        let second = mesh(vec![primitive(&[("POSITION", &b)], None)]);
        let mut backend = CachingBackend::new(CountingDevice::default());
        backend.render(&first, &Mat4::IDENTITY).unwrap();
        backend.render(&second, &Mat4::IDENTITY).unwrap();
        assert_eq!(backend.cached_vertex_buffers(), 1);
        assert_eq!(backend.cached_primitives(), 2);

        backend.destroy_mesh(&first);
        assert_eq!(backend.cached_vertex_buffers(), 1);
        assert_eq!(backend.device().live_buffers(), 1);

        backend.destroy_mesh(&second);
        assert_eq!(backend.cached_vertex_buffers(), 0);
        assert_eq!(backend.cached_primitives(), 0);
        assert_eq!(backend.device().live_buffers(), 0);
        assert_eq!(backend.device().count(|c| matches!(c, Call::DeleteVertexArray(_))), 2);
    }

    #[test]
    fn destroying_is_idempotent_and_ignores_unrendered_meshes() {
        let buffer = vertex_buffer();
        let positions = accessor(&view(&buffer, 0, 36, 0), 0, ComponentType::Float, 3, ElementType::Vec3);
        let mesh = mesh(vec![primitive(&[("POSITION", &positions)], None)]);
        let mut backend = CachingBackend::new(CountingDevice::default());

        backend.destroy_mesh(&mesh);
        assert!(backend.device().calls.is_empty());

        backend.render(&mesh, &Mat4::IDENTITY).unwrap();
        backend.destroy_mesh(&mesh);
        let calls = backend.device().calls.len();
        backend.destroy_mesh(&mesh);
        assert_eq!(backend.device().calls.len(), calls);

        // Rendering again recreates everything.
        backend.render(&mesh, &Mat4::IDENTITY).unwrap();
        assert_eq!(backend.device().count(|c| matches!(c, Call::CreateBuffer(..))), 2);
        assert_eq!(backend.cached_primitives(), 1);
    }

    #[test]
    fn failed_creation_leaves_nothing_cached() {
        let buffer = vertex_buffer();
        let positions = accessor(&view(&buffer, 0, 36, 0), 0, ComponentType::Float, 3, ElementType::Vec3);
        let mesh = mesh(vec![primitive(&[("POSITION", &positions)], None)]);
        let mut backend = CachingBackend::new(CountingDevice {
            fail_vertex_arrays: true,
            ..CountingDevice::default()
        });
        assert!(matches!(
            backend.render(&mesh, &Mat4::IDENTITY),
            Err(RenderError::ResourceCreation(_))
        ));
        assert_eq!(backend.cached_primitives(), 0);
        assert_eq!(backend.stats().draw_calls, 0);
    }

    #[test]
    fn primitives_without_attributes_are_not_drawn() {
        let mesh = mesh(vec![primitive(&[], None)]);
        let mut backend = CachingBackend::new(CountingDevice::default());
        backend.render(&mesh, &Mat4::IDENTITY).unwrap();
        assert_eq!(backend.stats().draw_calls, 0);
        assert_eq!(backend.device().count(|c| matches!(c, Call::DrawArrays(_))), 0);
    }
}
