//! The resolved, fully linked glTF data: buffers, buffer views, accessors and
//! meshes. Everything in here is immutable after loading and shared with
//! [`Rc`], so a mesh referenced by many nodes is one allocation.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a loaded resource. The render backend caches
/// GPU objects by this, so two structurally equal buffers are still two
/// resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> ResourceId {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        ResourceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Buffer {
    id: ResourceId,
    data: Vec<u8>,
    pub name: Option<String>,
}

impl Buffer {
    pub(crate) fn new(data: Vec<u8>, name: Option<String>) -> Buffer {
        Buffer {
            id: ResourceId::next(),
            data,
            name,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_length(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("byte_length", &self.data.len())
            .field("name", &self.name)
            .finish()
    }
}

/// What kind of GPU buffer a view's bytes are meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferTarget {
    VertexData,
    IndexData,
}

impl BufferTarget {
    pub fn from_gl(target: u32) -> Option<BufferTarget> {
        match target {
            34962 => Some(BufferTarget::VertexData),
            34963 => Some(BufferTarget::IndexData),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct BufferView {
    pub buffer: Rc<Buffer>,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Zero means tightly packed.
    pub byte_stride: usize,
    pub target: BufferTarget,
}

impl BufferView {
    /// The bytes of the underlying buffer this view covers. Empty if the
    /// view reaches past the end of the buffer, which the loader never lets
    /// through but a hand-built view might.
    pub fn bytes(&self) -> &[u8] {
        self.byte_offset
            .checked_add(self.byte_length)
            .and_then(|end| self.buffer.data().get(self.byte_offset..end))
            .unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
}

impl ComponentType {
    pub fn from_gl(component_type: u32) -> Option<ComponentType> {
        match component_type {
            5120 => Some(ComponentType::Byte),
            5121 => Some(ComponentType::UnsignedByte),
            5122 => Some(ComponentType::Short),
            5123 => Some(ComponentType::UnsignedShort),
            5124 => Some(ComponentType::Int),
            5125 => Some(ComponentType::UnsignedInt),
            5126 => Some(ComponentType::Float),
            _ => None,
        }
    }

    /// The GLenum value, which is also what glTF files store.
    pub fn to_gl(self) -> u32 {
        match self {
            ComponentType::Byte => 5120,
            ComponentType::UnsignedByte => 5121,
            ComponentType::Short => 5122,
            ComponentType::UnsignedShort => 5123,
            ComponentType::Int => 5124,
            ComponentType::UnsignedInt => 5125,
            ComponentType::Float => 5126,
        }
    }

    pub fn size(self) -> usize {
        match self {
            ComponentType::Byte | ComponentType::UnsignedByte => 1,
            ComponentType::Short | ComponentType::UnsignedShort => 2,
            ComponentType::Int | ComponentType::UnsignedInt | ComponentType::Float => 4,
        }
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            ComponentType::UnsignedByte | ComponentType::UnsignedShort | ComponentType::UnsignedInt
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl ElementType {
    pub fn from_token(token: &str) -> Option<ElementType> {
        match token {
            "SCALAR" => Some(ElementType::Scalar),
            "VEC2" => Some(ElementType::Vec2),
            "VEC3" => Some(ElementType::Vec3),
            "VEC4" => Some(ElementType::Vec4),
            _ => None,
        }
    }

    pub fn component_count(self) -> usize {
        match self {
            ElementType::Scalar => 1,
            ElementType::Vec2 => 2,
            ElementType::Vec3 => 3,
            ElementType::Vec4 => 4,
        }
    }
}

#[derive(Debug)]
pub struct Accessor {
    pub buffer_view: Rc<BufferView>,
    pub byte_offset: usize,
    pub component_type: ComponentType,
    pub count: usize,
    pub normalized: bool,
    pub element_type: ElementType,
}

impl Accessor {
    /// Size of one element in bytes, e.g. 12 for a float VEC3.
    pub fn element_size(&self) -> usize {
        self.component_type.size() * self.element_type.component_count()
    }

    /// Distance between the starts of two consecutive elements.
    pub fn effective_stride(&self) -> usize {
        match self.buffer_view.byte_stride {
            0 => self.element_size(),
            stride => stride,
        }
    }

    /// Bytes of the buffer view this accessor reads, counted from the start
    /// of the view.
    pub fn required_view_length(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        // Saturating, so absurd counts fail the bounds check instead of
        // overflowing.
        self.effective_stride()
            .saturating_mul(self.count - 1)
            .saturating_add(self.byte_offset)
            .saturating_add(self.element_size())
    }

    /// Offset of the first element from the start of the whole buffer.
    pub fn buffer_offset(&self) -> usize {
        self.buffer_view.byte_offset + self.byte_offset
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveMode {
    pub fn from_gl(mode: u32) -> Option<PrimitiveMode> {
        match mode {
            0 => Some(PrimitiveMode::Points),
            1 => Some(PrimitiveMode::Lines),
            2 => Some(PrimitiveMode::LineLoop),
            3 => Some(PrimitiveMode::LineStrip),
            4 => Some(PrimitiveMode::Triangles),
            5 => Some(PrimitiveMode::TriangleStrip),
            6 => Some(PrimitiveMode::TriangleFan),
            _ => None,
        }
    }

    pub fn to_gl(self) -> u32 {
        match self {
            PrimitiveMode::Points => 0,
            PrimitiveMode::Lines => 1,
            PrimitiveMode::LineLoop => 2,
            PrimitiveMode::LineStrip => 3,
            PrimitiveMode::Triangles => 4,
            PrimitiveMode::TriangleStrip => 5,
            PrimitiveMode::TriangleFan => 6,
        }
    }
}

/// Semantic attribute name (e.g. `POSITION`) to accessor.
pub type PrimitiveAttributes = BTreeMap<String, Rc<Accessor>>;

#[derive(Debug)]
pub struct MeshPrimitive {
    id: ResourceId,
    pub attributes: PrimitiveAttributes,
    pub indices: Option<Rc<Accessor>>,
    pub mode: PrimitiveMode,
}

impl MeshPrimitive {
    pub(crate) fn new(
        attributes: PrimitiveAttributes,
        indices: Option<Rc<Accessor>>,
        mode: PrimitiveMode,
    ) -> MeshPrimitive {
        MeshPrimitive {
            id: ResourceId::next(),
            attributes,
            indices,
            mode,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Vertex count for non-indexed drawing: the POSITION accessor's count,
    /// or the first attribute's if there's no POSITION.
    pub fn vertex_count(&self) -> Option<usize> {
        self.attributes
            .get("POSITION")
            .or_else(|| self.attributes.values().next())
            .map(|accessor| accessor.count)
    }
}

#[derive(Debug)]
pub struct Mesh {
    pub primitives: Vec<MeshPrimitive>,
    pub name: Option<String>,
}
