use crate::renderer::{gl, RenderError};

/// The vertex attribute location of the POSITION attribute of glTF models.
pub const ATTR_LOC_POSITION: gl::types::GLuint = 0;
/// The vertex attribute location of the NORMAL attribute of glTF models.
pub const ATTR_LOC_NORMAL: gl::types::GLuint = 1;
/// The vertex attribute location of the TANGENT attribute of glTF models.
pub const ATTR_LOC_TANGENT: gl::types::GLuint = 2;
/// The vertex attribute location of the TEXCOORD_0 attribute of glTF models.
pub const ATTR_LOC_TEXCOORD_0: gl::types::GLuint = 3;
/// The vertex attribute location of the TEXCOORD_1 attribute of glTF models.
pub const ATTR_LOC_TEXCOORD_1: gl::types::GLuint = 4;
/// The vertex attribute location of the COLOR_0 attribute of glTF models.
pub const ATTR_LOC_COLOR_0: gl::types::GLuint = 5;

const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec4 TANGENT;
layout(location = 3) in vec2 TEXCOORD_0;
layout(location = 4) in vec2 TEXCOORD_1;
layout(location = 5) in vec4 COLOR_0;
out vec4 view_position;
uniform mat4 u_transform;
uniform mat4 u_view;
uniform mat4 u_projection;
void main() {
    view_position = u_view * u_transform * vec4(POSITION, 1.0);
    gl_Position = u_projection * view_position;
}
"#;
const FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
out vec4 FRAG_COLOR;
in vec4 view_position;
void main() {
    // Flat shading from the screen-space derivatives of the view position,
    // lit from straight above.
    vec3 x_tangent = dFdx(view_position.xyz);
    vec3 y_tangent = dFdy(view_position.xyz);
    vec3 face_normal = normalize(cross(x_tangent, y_tangent));
    float light = (face_normal.y + 1.0) / 2.0;
    vec3 output_linear_color = vec3(vec2(light), 1.0);

    // The framebuffer is not SRGB, so we transform the linear color to close-enough-to-srgb.
    FRAG_COLOR = vec4(pow(output_linear_color, vec3(1.0 / 2.2)), 1.0);
}
"#;

/// The shader input location of a glTF attribute semantic, if the shader
/// has one.
pub fn attribute_location(semantic: &str) -> Option<gl::types::GLuint> {
    match semantic {
        "POSITION" => Some(ATTR_LOC_POSITION),
        "NORMAL" => Some(ATTR_LOC_NORMAL),
        "TANGENT" => Some(ATTR_LOC_TANGENT),
        "TEXCOORD_0" => Some(ATTR_LOC_TEXCOORD_0),
        "TEXCOORD_1" => Some(ATTR_LOC_TEXCOORD_1),
        "COLOR_0" => Some(ATTR_LOC_COLOR_0),
        _ => None,
    }
}

pub struct ShaderProgram {
    pub program: gl::types::GLuint,
    pub transform_location: gl::types::GLint,
    pub view_location: gl::types::GLint,
    pub projection_location: gl::types::GLint,
}

/// Compiles and returns the shader program which should be used to render the
/// glTF models.
pub fn create_program() -> Result<ShaderProgram, RenderError> {
    let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, VERTEX_SHADER)?;
    let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, FRAGMENT_SHADER) {
        Ok(shader) => shader,
        Err(err) => {
            gl::call!(gl::DeleteShader(vertex_shader));
            return Err(err);
        }
    };
    let program = gl::create_program(&[vertex_shader, fragment_shader]);
    gl::call!(gl::DeleteShader(vertex_shader));
    gl::call!(gl::DeleteShader(fragment_shader));
    let program = program?;

    gl::call!(gl::UseProgram(program));
    let uniform = |name: &str| {
        gl::get_uniform_location(program, name)
            .ok_or_else(|| RenderError::Shader(format!("the shader program has no uniform {name}")))
    };
    let locations = (uniform("u_transform"), uniform("u_view"), uniform("u_projection"));
    let (transform_location, view_location, projection_location) = match locations {
        (Ok(transform), Ok(view), Ok(projection)) => (transform, view, projection),
        (Err(err), _, _) | (_, Err(err), _) | (_, _, Err(err)) => {
            gl::call!(gl::DeleteProgram(program));
            return Err(err);
        }
    };
    Ok(ShaderProgram {
        program,
        transform_location,
        view_location,
        projection_location,
    })
}
