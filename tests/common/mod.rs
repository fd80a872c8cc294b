#![allow(dead_code)]

use futures::future::LocalBoxFuture;
use glam::Mat4;
use gltf_scene::gltf::{BufferSource, ResourceMap};
use gltf_scene::mesh::{BufferTarget, ComponentType, PrimitiveMode};
use gltf_scene::renderer::{AttributeLayout, GpuDevice, RenderError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum GpuCall {
    CreateBuffer {
        name: u32,
        target: BufferTarget,
        data: Vec<u8>,
    },
    DeleteBuffer(u32),
    CreateVertexArray(u32),
    DeleteVertexArray(u32),
    AttribPointer {
        location: u32,
        buffer: u32,
        layout: AttributeLayout,
    },
    BindIndexBuffer(u32),
    Transforms {
        world: Mat4,
        view: Mat4,
        projection: Mat4,
    },
    DrawArrays {
        mode: PrimitiveMode,
        count: usize,
    },
    DrawElements {
        mode: PrimitiveMode,
        count: usize,
        index_type: ComponentType,
        offset: usize,
    },
    Clear,
}

/// A [`GpuDevice`] that only writes down what it was asked to do. Clones
/// share the log, so it can be inspected after the backend is gone.
#[derive(Clone, Default)]
pub struct RecordingDevice {
    log: Rc<RefCell<Vec<GpuCall>>>,
    next_name: Rc<Cell<u32>>,
}

impl RecordingDevice {
    pub fn calls(&self) -> Vec<GpuCall> {
        self.log.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.log.borrow().iter().filter(|call| predicate(call)).count()
    }

    /// Buffers and vertex arrays created but not deleted yet.
    pub fn live_resources(&self) -> usize {
        let created = self.count(|call| {
            matches!(call, GpuCall::CreateBuffer { .. } | GpuCall::CreateVertexArray(_))
        });
        let deleted =
            self.count(|call| matches!(call, GpuCall::DeleteBuffer(_) | GpuCall::DeleteVertexArray(_)));
        created - deleted
    }

    fn name(&self) -> u32 {
        self.next_name.set(self.next_name.get() + 1);
        self.next_name.get()
    }

    fn push(&self, call: GpuCall) {
        self.log.borrow_mut().push(call);
    }
}

impl GpuDevice for RecordingDevice {
    type Buffer = u32;
    type VertexArray = u32;

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> Result<u32, RenderError> {
        let name = self.name();
        self.push(GpuCall::CreateBuffer {
            name,
            target,
            data: data.to_vec(),
        });
        Ok(name)
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.push(GpuCall::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&mut self) -> Result<u32, RenderError> {
        let name = self.name();
        self.push(GpuCall::CreateVertexArray(name));
        Ok(name)
    }

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        self.push(GpuCall::DeleteVertexArray(vertex_array));
    }

    fn bind_vertex_array(&mut self, _: Option<u32>) {}

    fn attribute_location(&self, semantic: &str) -> Option<u32> {
        gltf_scene::renderer::program::attribute_location(semantic)
    }

    fn vertex_attrib_pointer(&mut self, location: u32, buffer: u32, layout: AttributeLayout) {
        self.push(GpuCall::AttribPointer {
            location,
            buffer,
            layout,
        });
    }

    fn bind_index_buffer(&mut self, buffer: u32) {
        self.push(GpuCall::BindIndexBuffer(buffer));
    }

    fn set_transforms(&mut self, world: &Mat4, view: &Mat4, projection: &Mat4) {
        self.push(GpuCall::Transforms {
            world: *world,
            view: *view,
            projection: *projection,
        });
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, _first: usize, count: usize) {
        self.push(GpuCall::DrawArrays { mode, count });
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: usize, index_type: ComponentType, offset: usize) {
        self.push(GpuCall::DrawElements {
            mode,
            count,
            index_type,
            offset,
        });
    }

    fn clear(&mut self) {
        self.push(GpuCall::Clear);
    }
}

/// A [`BufferSource`] that remembers every URI it was asked for.
pub struct CountingSource<'a> {
    pub inner: ResourceMap<'a>,
    pub requested: RefCell<Vec<String>>,
}

impl<'a> CountingSource<'a> {
    pub fn new(inner: ResourceMap<'a>) -> CountingSource<'a> {
        CountingSource {
            inner,
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl BufferSource for CountingSource<'_> {
    fn fetch<'a>(&'a self, uri: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        self.requested.borrow_mut().push(uri.to_string());
        self.inner.fetch(uri)
    }
}

/// One triangle: three float VEC3 positions followed by three u16 indices,
/// padded to 44 bytes.
pub fn triangle_buffer() -> Vec<u8> {
    let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    let indices: [u16; 4] = [0, 1, 2, 0];
    let mut data = bytemuck::cast_slice::<f32, u8>(&positions).to_vec();
    data.extend_from_slice(bytemuck::cast_slice::<u16, u8>(&indices));
    data
}

/// A file with two scenes sharing one mesh:
///
/// - scene 0 (the default): node 0 "root" at z=-5, with children node 1
///   "triangle" (the mesh) and node 2 "camera" at z=10.
/// - scene 1: node 3 "other", also using the mesh.
///
/// `buffer` is spliced into the buffer object, e.g. `"uri": "triangle.bin",`.
pub fn triangle_gltf(buffer: &str) -> String {
    format!(
        r#"{{
    "asset": {{ "version": "2.0", "generator": "hand written" }},
    "scene": 0,
    "scenes": [
        {{ "name": "main", "nodes": [0] }},
        {{ "name": "secondary", "nodes": [3] }}
    ],
    "nodes": [
        {{ "name": "root", "children": [1, 2], "translation": [0, 0, -5] }},
        {{ "name": "triangle", "mesh": 0 }},
        {{ "name": "camera", "camera": 0, "translation": [0, 0, 10] }},
        {{ "name": "other", "mesh": 0, "scale": [2, 2, 2] }}
    ],
    "cameras": [
        {{ "type": "perspective", "perspective": {{ "yfov": 0.8, "znear": 0.1, "aspectRatio": 1.5 }} }}
    ],
    "meshes": [
        {{ "name": "triangle", "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}
    ],
    "accessors": [
        {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "max": [1, 1, 0], "min": [0, 0, 0] }},
        {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
    ],
    "bufferViews": [
        {{ "buffer": 0, "byteLength": 36, "target": 34962 }},
        {{ "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }}
    ],
    "buffers": [
        {{ {buffer} "byteLength": 44 }}
    ]
}}"#
    )
}

/// Wraps JSON and an optional BIN chunk into a GLB container.
pub fn glb(json: &str, bin: Option<&[u8]>) -> Vec<u8> {
    fn chunk(file: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8], padding: u8) {
        let padded_length = data.len().div_ceil(4) * 4;
        file.extend_from_slice(&(padded_length as u32).to_le_bytes());
        file.extend_from_slice(chunk_type);
        file.extend_from_slice(data);
        file.resize(file.len() + padded_length - data.len(), padding);
    }

    let mut body = Vec::new();
    chunk(&mut body, b"JSON", json.as_bytes(), b' ');
    if let Some(bin) = bin {
        chunk(&mut body, b"BIN\0", bin, 0);
    }
    let mut file = Vec::new();
    file.extend_from_slice(b"glTF");
    file.extend_from_slice(&2u32.to_le_bytes());
    file.extend_from_slice(&(12 + body.len() as u32).to_le_bytes());
    file.extend_from_slice(&body);
    file
}
