use crate::mesh::{BufferTarget, ComponentType, PrimitiveMode};
use crate::renderer::cache::{AttributeLayout, GpuDevice};
use crate::renderer::program::{self, ShaderProgram};
use crate::renderer::{gl, RenderError};
use glam::Mat4;
use std::ffi::c_void;
use std::ptr;

/// [`GpuDevice`] over an OpenGL ES 3.0 context. The context must be current
/// on this thread for the whole lifetime of the device.
pub struct GlDevice {
    program: ShaderProgram,
}

impl GlDevice {
    /// Loads the GL functions with `get_proc_address` and compiles the
    /// shader program.
    pub fn new<F>(get_proc_address: F) -> Result<GlDevice, RenderError>
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(get_proc_address);
        let program = program::create_program()?;
        gl::call!(gl::ClearColor(0.0, 0.0, 0.0, 1.0));
        gl::call!(gl::Enable(gl::DEPTH_TEST));
        gl::call!(gl::Enable(gl::CULL_FACE));
        Ok(GlDevice { program })
    }

    pub fn resize(&mut self, width: i32, height: i32) {
        gl::call!(gl::Viewport(0, 0, width, height));
    }
}

impl GpuDevice for GlDevice {
    type Buffer = gl::types::GLuint;
    type VertexArray = gl::types::GLuint;

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> Result<Self::Buffer, RenderError> {
        let mut buffer = 0;
        gl::call!(gl::GenBuffers(1, &mut buffer));
        if buffer == 0 {
            return Err(RenderError::ResourceCreation("GL buffer"));
        }
        let target = match target {
            BufferTarget::VertexData => gl::ARRAY_BUFFER,
            // Binding this also attaches the buffer to the current vertex
            // array, which is fine, it's going to be bound there anyway.
            BufferTarget::IndexData => gl::ELEMENT_ARRAY_BUFFER,
        };
        gl::call!(gl::BindBuffer(target, buffer));
        gl::buffer_data(target, data, gl::STATIC_DRAW);
        if target == gl::ARRAY_BUFFER {
            gl::call!(gl::BindBuffer(target, 0));
        }
        Ok(buffer)
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        gl::call!(gl::DeleteBuffers(1, &buffer));
    }

    fn create_vertex_array(&mut self) -> Result<Self::VertexArray, RenderError> {
        let mut vertex_array = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vertex_array));
        if vertex_array == 0 {
            return Err(RenderError::ResourceCreation("GL vertex array object"));
        }
        Ok(vertex_array)
    }

    fn delete_vertex_array(&mut self, vertex_array: Self::VertexArray) {
        gl::call!(gl::DeleteVertexArrays(1, &vertex_array));
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<Self::VertexArray>) {
        gl::call!(gl::BindVertexArray(vertex_array.unwrap_or(0)));
    }

    fn attribute_location(&self, semantic: &str) -> Option<u32> {
        program::attribute_location(semantic)
    }

    fn vertex_attrib_pointer(&mut self, location: u32, buffer: Self::Buffer, layout: AttributeLayout) {
        gl::call!(gl::EnableVertexAttribArray(location));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, buffer));
        gl::call!(gl::VertexAttribPointer(
            location,
            layout.components as gl::types::GLint,
            layout.component_type.to_gl(),
            if layout.normalized { gl::TRUE } else { gl::FALSE },
            layout.stride as gl::types::GLsizei,
            ptr::null::<c_void>().wrapping_add(layout.offset),
        ));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));
    }

    fn bind_index_buffer(&mut self, buffer: Self::Buffer) {
        gl::call!(gl::BindBuffer(gl::ELEMENT_ARRAY_BUFFER, buffer));
    }

    fn set_transforms(&mut self, world: &Mat4, view: &Mat4, projection: &Mat4) {
        let ShaderProgram {
            program,
            transform_location,
            view_location,
            projection_location,
        } = self.program;
        gl::call!(gl::UseProgram(program));
        for (location, matrix) in [
            (transform_location, world),
            (view_location, view),
            (projection_location, projection),
        ] {
            let columns = matrix_columns(matrix);
            gl::call!(gl::UniformMatrix4fv(location, 1, gl::FALSE, columns.as_ptr()));
        }
        // glTF spec section 3.7.4:
        let front_face = if world.determinant() < 0.0 { gl::CW } else { gl::CCW };
        gl::call!(gl::FrontFace(front_face));
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: usize, count: usize) {
        gl::call!(gl::DrawArrays(
            mode.to_gl(),
            first as gl::types::GLint,
            count as gl::types::GLsizei,
        ));
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: usize, index_type: ComponentType, offset: usize) {
        gl::call!(gl::DrawElements(
            mode.to_gl(),
            count as gl::types::GLsizei,
            index_type.to_gl(),
            ptr::null::<c_void>().wrapping_add(offset),
        ));
    }

    fn clear(&mut self) {
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));
    }
}

impl Drop for GlDevice {
    fn drop(&mut self) {
        gl::call!(gl::DeleteProgram(self.program.program));
    }
}

/// Column-major, the layout `UniformMatrix4fv` expects without transposing.
fn matrix_columns(matrix: &Mat4) -> &[f32] {
    bytemuck::cast_slice(std::slice::from_ref(matrix))
}
