//! Raw descriptors, straight out of the JSON. Indices in here are not
//! checked against anything yet, that's what the resolution stages do.

use crate::gltf::LoadError;
use std::collections::HashMap;
use tinyjson::JsonValue;

pub struct Document {
    pub version: String,
    pub default_scene: Option<usize>,
    pub buffers: Vec<BufferDesc>,
    pub buffer_views: Vec<BufferViewDesc>,
    pub accessors: Vec<AccessorDesc>,
    pub meshes: Vec<MeshDesc>,
    pub cameras: Vec<CameraDesc>,
    pub nodes: Vec<NodeDesc>,
    pub scenes: Vec<SceneDesc>,
}

pub struct BufferDesc {
    pub uri: Option<String>,
    pub byte_length: usize,
    pub name: Option<String>,
}

pub struct BufferViewDesc {
    pub buffer: usize,
    pub byte_offset: Option<usize>,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<usize>,
}

pub struct AccessorDesc {
    pub buffer_view: Option<usize>,
    pub byte_offset: Option<usize>,
    pub component_type: usize,
    pub count: usize,
    pub normalized: Option<bool>,
    pub element_type: String,
}

pub struct MeshDesc {
    pub primitives: Vec<PrimitiveDesc>,
    pub name: Option<String>,
}

pub struct PrimitiveDesc {
    pub attributes: Vec<(String, usize)>,
    pub indices: Option<usize>,
    pub mode: Option<usize>,
}

pub enum CameraDesc {
    Perspective {
        yfov: Option<f32>,
        znear: Option<f32>,
        zfar: Option<f32>,
    },
    Orthographic,
}

pub struct NodeDesc {
    pub name: Option<String>,
    pub mesh: Option<usize>,
    pub camera: Option<usize>,
    pub children: Vec<usize>,
    pub matrix: Option<[f32; 16]>,
    pub translation: Option<[f32; 3]>,
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
}

pub struct SceneDesc {
    pub nodes: Vec<usize>,
    pub name: Option<String>,
}

impl Document {
    /// Parses the JSON and checks the asset version before reading anything
    /// else.
    pub fn parse(json: &str) -> Result<Document, LoadError> {
        let json: JsonValue = json.parse().map_err(|err| LoadError::Json(format!("{err}")))?;
        let root = Object::new("glTF file".to_string(), &json)?;

        let asset = root
            .object("asset")?
            .ok_or_else(|| LoadError::missing("glTF file", "asset"))?;
        let version = asset
            .string("version")?
            .ok_or_else(|| LoadError::missing("asset", "version"))?;
        if !version.starts_with("2.") {
            return Err(LoadError::UnsupportedVersion(version.to_string()));
        }

        Ok(Document {
            version: version.to_string(),
            default_scene: root.index("scene")?,
            buffers: root.each("buffers", "buffer", parse_buffer)?,
            buffer_views: root.each("bufferViews", "buffer view", parse_buffer_view)?,
            accessors: root.each("accessors", "accessor", parse_accessor)?,
            meshes: root.each("meshes", "mesh", parse_mesh)?,
            cameras: root.each("cameras", "camera", parse_camera)?,
            nodes: root.each("nodes", "node", parse_node)?,
            scenes: root.each("scenes", "scene", parse_scene)?,
        })
    }
}

fn parse_buffer(buffer: Object) -> Result<BufferDesc, LoadError> {
    Ok(BufferDesc {
        uri: buffer.string("uri")?.map(str::to_string),
        byte_length: buffer.required_index("byteLength")?,
        name: buffer.name()?,
    })
}

fn parse_buffer_view(view: Object) -> Result<BufferViewDesc, LoadError> {
    Ok(BufferViewDesc {
        buffer: view.required_index("buffer")?,
        byte_offset: view.index("byteOffset")?,
        byte_length: view.required_index("byteLength")?,
        byte_stride: view.index("byteStride")?,
        target: view.index("target")?,
    })
}

fn parse_accessor(accessor: Object) -> Result<AccessorDesc, LoadError> {
    Ok(AccessorDesc {
        buffer_view: accessor.index("bufferView")?,
        byte_offset: accessor.index("byteOffset")?,
        component_type: accessor.required_index("componentType")?,
        count: accessor.required_index("count")?,
        normalized: accessor.boolean("normalized")?,
        element_type: accessor
            .string("type")?
            .ok_or_else(|| LoadError::missing(accessor.what.clone(), "type"))?
            .to_string(),
    })
}

fn parse_mesh(mesh: Object) -> Result<MeshDesc, LoadError> {
    let mut primitives = Vec::new();
    for (i, primitive) in mesh.array("primitives")?.iter().enumerate() {
        let primitive = Object::new(format!("{} primitive {i}", mesh.what), primitive)?;
        let attributes = primitive
            .object("attributes")?
            .ok_or_else(|| LoadError::missing(primitive.what.clone(), "attributes"))?;
        let mut attribute_accessors = Vec::with_capacity(attributes.fields.len());
        for (semantic, accessor) in attributes.fields {
            let accessor = take_usize(accessor)
                .ok_or_else(|| LoadError::invalid(primitive.what.clone(), "attributes"))?;
            attribute_accessors.push((semantic.clone(), accessor));
        }
        // HashMap iteration order is random, keep error messages stable.
        attribute_accessors.sort();
        primitives.push(PrimitiveDesc {
            attributes: attribute_accessors,
            indices: primitive.index("indices")?,
            mode: primitive.index("mode")?,
        });
    }
    Ok(MeshDesc {
        primitives,
        name: mesh.name()?,
    })
}

fn parse_camera(camera: Object) -> Result<CameraDesc, LoadError> {
    match camera.string("type")? {
        Some("orthographic") => Ok(CameraDesc::Orthographic),
        Some("perspective") | None => {
            let perspective = camera.object("perspective")?;
            let get = |key: &'static str| match &perspective {
                Some(perspective) => perspective.number(key),
                None => Ok(None),
            };
            Ok(CameraDesc::Perspective {
                yfov: get("yfov")?,
                znear: get("znear")?,
                zfar: get("zfar")?,
            })
        }
        Some(_) => Err(LoadError::invalid(camera.what, "type")),
    }
}

fn parse_node(node: Object) -> Result<NodeDesc, LoadError> {
    Ok(NodeDesc {
        name: node.name()?,
        mesh: node.index("mesh")?,
        camera: node.index("camera")?,
        children: node.indices("children")?,
        matrix: node.floats("matrix")?,
        translation: node.floats("translation")?,
        rotation: node.floats("rotation")?,
        scale: node.floats("scale")?,
    })
}

fn parse_scene(scene: Object) -> Result<SceneDesc, LoadError> {
    Ok(SceneDesc {
        nodes: scene.indices("nodes")?,
        name: scene.name()?,
    })
}

/// A JSON object along with a human readable description of where it came
/// from, for error messages.
struct Object<'a> {
    what: String,
    fields: &'a HashMap<String, JsonValue>,
}

impl<'a> Object<'a> {
    fn new(what: String, value: &'a JsonValue) -> Result<Object<'a>, LoadError> {
        match value.get::<HashMap<_, _>>() {
            Some(fields) => Ok(Object { what, fields }),
            None => Err(LoadError::Json(format!("{what} is not an object"))),
        }
    }

    /// Absent and `null` are treated the same.
    fn get(&self, key: &str) -> Option<&'a JsonValue> {
        self.fields.get(key).filter(|value| !matches!(value, JsonValue::Null))
    }

    fn each<T>(
        &self,
        key: &'static str,
        kind: &str,
        parse: impl Fn(Object) -> Result<T, LoadError>,
    ) -> Result<Vec<T>, LoadError> {
        let values = self.array(key)?;
        let mut result = Vec::with_capacity(values.len());
        for (i, value) in values.iter().enumerate() {
            result.push(parse(Object::new(format!("{kind} {i}"), value)?)?);
        }
        Ok(result)
    }

    fn array(&self, key: &'static str) -> Result<&'a [JsonValue], LoadError> {
        match self.get(key) {
            Some(value) => match value.get::<Vec<_>>() {
                Some(values) => Ok(values),
                None => Err(LoadError::invalid(self.what.clone(), key)),
            },
            None => Ok(&[]),
        }
    }

    fn object(&self, key: &'static str) -> Result<Option<Object<'a>>, LoadError> {
        match self.get(key) {
            Some(value) if value.get::<HashMap<_, _>>().is_some() => {
                Ok(Some(Object::new(format!("{} {key}", self.what), value)?))
            }
            Some(_) => Err(LoadError::invalid(self.what.clone(), key)),
            None => Ok(None),
        }
    }

    fn index(&self, key: &'static str) -> Result<Option<usize>, LoadError> {
        self.get(key)
            .map(|value| take_usize(value).ok_or_else(|| LoadError::invalid(self.what.clone(), key)))
            .transpose()
    }

    fn required_index(&self, key: &'static str) -> Result<usize, LoadError> {
        self.index(key)?
            .ok_or_else(|| LoadError::missing(self.what.clone(), key))
    }

    fn indices(&self, key: &'static str) -> Result<Vec<usize>, LoadError> {
        self.array(key)?
            .iter()
            .map(|value| take_usize(value).ok_or_else(|| LoadError::invalid(self.what.clone(), key)))
            .collect()
    }

    fn number(&self, key: &'static str) -> Result<Option<f32>, LoadError> {
        self.get(key)
            .map(|value| match value.get::<f64>() {
                Some(number) => Ok(*number as f32),
                None => Err(LoadError::invalid(self.what.clone(), key)),
            })
            .transpose()
    }

    fn floats<const N: usize>(&self, key: &'static str) -> Result<Option<[f32; N]>, LoadError> {
        let Some(value) = self.get(key) else {
            return Ok(None);
        };
        take_floats(value)
            .map(Some)
            .ok_or_else(|| LoadError::invalid(self.what.clone(), key))
    }

    fn boolean(&self, key: &'static str) -> Result<Option<bool>, LoadError> {
        self.get(key)
            .map(|value| value.get::<bool>().copied().ok_or_else(|| LoadError::invalid(self.what.clone(), key)))
            .transpose()
    }

    fn string(&self, key: &'static str) -> Result<Option<&'a str>, LoadError> {
        self.get(key)
            .map(|value| match value.get::<String>() {
                Some(string) => Ok(string.as_str()),
                None => Err(LoadError::invalid(self.what.clone(), key)),
            })
            .transpose()
    }

    fn name(&self) -> Result<Option<String>, LoadError> {
        Ok(self.string("name")?.map(str::to_string))
    }
}

/// Return usize if JsonValue is a non-negative whole number, otherwise None.
fn take_usize(json_value: &JsonValue) -> Option<usize> {
    let number = *json_value.get::<f64>()?;
    (number >= 0.0 && number.fract() == 0.0 && number <= u32::MAX as f64).then_some(number as usize)
}

/// Return the N numbers of a JsonValue array, or None if it is anything
/// else (including an array of the wrong length).
fn take_floats<const N: usize>(json_value: &JsonValue) -> Option<[f32; N]> {
    let values: &Vec<JsonValue> = json_value.get()?;
    if values.len() != N {
        return None;
    }
    let mut result = [0.0; N];
    for (i, value) in values.iter().enumerate() {
        result[i] = *value.get::<f64>()? as f32;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_other_major_versions() {
        let result = Document::parse(r#"{"asset":{"version":"1.0"},"buffers":[{"byteLength":4}]}"#);
        assert!(matches!(result, Err(LoadError::UnsupportedVersion(version)) if version == "1.0"));
    }

    #[test]
    fn version_is_checked_before_the_rest_of_the_file() {
        // The broken accessor would be an error in a 2.0 file.
        let result = Document::parse(r#"{"asset":{"version":"3.0"},"accessors":[{"count":-1}]}"#);
        assert!(matches!(result, Err(LoadError::UnsupportedVersion(_))));
    }

    #[test]
    fn missing_asset_version() {
        let result = Document::parse(r#"{"asset":{}}"#);
        assert!(matches!(
            result,
            Err(LoadError::MissingRequiredField { field: "version", .. })
        ));
    }

    #[test]
    fn not_json() {
        assert!(matches!(Document::parse("{"), Err(LoadError::Json(_))));
    }

    #[test]
    fn indices_must_be_whole_numbers() {
        let fractional = r#"{"asset":{"version":"2.0"},"nodes":[{"mesh":0.5}]}"#;
        let negative = r#"{"asset":{"version":"2.0"},"nodes":[{"children":[-1]}]}"#;
        assert!(matches!(
            Document::parse(fractional),
            Err(LoadError::InvalidField { field: "mesh", .. })
        ));
        assert!(matches!(
            Document::parse(negative),
            Err(LoadError::InvalidField { field: "children", .. })
        ));
    }

    #[test]
    fn optional_fields_stay_unset() {
        let document = Document::parse(
            r#"{
                "asset": {"version": "2.0"},
                "bufferViews": [{"buffer": 0, "byteLength": 8}],
                "accessors": [{"componentType": 5126, "count": 2, "type": "SCALAR"}],
                "nodes": [{"name": "a", "translation": [1, 2, 3], "children": [1]}, {}],
                "cameras": [{"type": "perspective", "perspective": {"yfov": 1.0, "znear": 0.1}}]
            }"#,
        )
        .unwrap();
        assert_eq!(document.default_scene, None);
        assert!(document.buffers.is_empty());
        let view = &document.buffer_views[0];
        assert_eq!((view.byte_offset, view.byte_stride, view.target), (None, None, None));
        let accessor = &document.accessors[0];
        assert_eq!(accessor.buffer_view, None);
        assert_eq!(accessor.normalized, None);
        assert_eq!(document.nodes[0].translation, Some([1.0, 2.0, 3.0]));
        assert_eq!(document.nodes[0].children, vec![1]);
        assert_eq!(document.nodes[0].name.as_deref(), Some("a"));
        assert!(document.nodes[1].children.is_empty());
        assert!(matches!(
            document.cameras[0],
            CameraDesc::Perspective { yfov: Some(_), znear: Some(_), zfar: None }
        ));
    }

    #[test]
    fn wrong_length_vectors_are_rejected() {
        let result = Document::parse(r#"{"asset":{"version":"2.0"},"nodes":[{"scale":[1,1]}]}"#);
        assert!(matches!(result, Err(LoadError::InvalidField { field: "scale", .. })));
    }
}
