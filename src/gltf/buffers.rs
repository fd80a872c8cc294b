use crate::gltf::document::BufferDesc;
use crate::gltf::LoadError;
use crate::mesh::Buffer;
use anyhow::Context;
use base64::Engine as _;
use futures::future::{self, FutureExt, LocalBoxFuture};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Turns a buffer URI into bytes. This is where network fetches or file
/// reads happen, everything after it is synchronous.
pub trait BufferSource {
    fn fetch<'a>(&'a self, uri: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>>;
}

/// Buffers that are already in memory, looked up by their exact URI.
#[derive(Default)]
pub struct ResourceMap<'a> {
    resources: HashMap<&'a str, &'a [u8]>,
}

impl<'a> ResourceMap<'a> {
    pub fn new(resources: &[(&'a str, &'a [u8])]) -> ResourceMap<'a> {
        ResourceMap {
            resources: resources.iter().copied().collect(),
        }
    }

    pub fn insert(&mut self, uri: &'a str, data: &'a [u8]) {
        self.resources.insert(uri, data);
    }
}

impl BufferSource for ResourceMap<'_> {
    fn fetch<'a>(&'a self, uri: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        let result = match self.resources.get(uri) {
            Some(data) => Ok(data.to_vec()),
            None => Err(anyhow::anyhow!("could not find buffer with uri \"{uri}\"")),
        };
        future::ready(result).boxed_local()
    }
}

/// Reads buffers from files, relative to the directory the glTF file is in.
/// URIs are percent-decoded before they're used as paths.
pub struct DirectorySource {
    base: PathBuf,
}

impl DirectorySource {
    pub fn new(base: impl Into<PathBuf>) -> DirectorySource {
        DirectorySource { base: base.into() }
    }
}

impl BufferSource for DirectorySource {
    fn fetch<'a>(&'a self, uri: &'a str) -> LocalBoxFuture<'a, anyhow::Result<Vec<u8>>> {
        async move {
            let relative = percent_decode_str(uri)
                .decode_utf8()
                .with_context(|| format!("\"{uri}\" is not valid UTF-8 once decoded"))?;
            let path = self.base.join(&*relative);
            std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
        }
        .boxed_local()
    }
}

/// Decodes a `data:` URI, either base64 or percent-encoded. `None` if the
/// URI is something else.
pub fn decode_data_uri(uri: &str) -> Option<anyhow::Result<Vec<u8>>> {
    let rest = uri.strip_prefix("data:")?;
    let Some((header, payload)) = rest.split_once(',') else {
        return Some(Err(anyhow::anyhow!("data URI without a payload")));
    };
    Some(if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .context("decoding base64 data URI")
    } else {
        Ok(percent_decode_str(payload).collect())
    })
}

/// Fetches every declared buffer concurrently. All URIs are checked before
/// any fetch starts, so a missing URI never causes I/O. `data:` URIs are
/// decoded in place, without going through `source`. `glb_bin` backs buffer 0
/// when it has no URI.
pub async fn load_buffers<S: BufferSource + ?Sized>(
    descs: &[BufferDesc],
    source: &S,
    glb_bin: Option<&[u8]>,
) -> Result<Vec<Rc<Buffer>>, LoadError> {
    let mut uris = Vec::with_capacity(descs.len());
    for (i, desc) in descs.iter().enumerate() {
        match (&desc.uri, glb_bin) {
            (Some(uri), _) => uris.push(Some(uri.as_str())),
            (None, Some(_)) if i == 0 => uris.push(None),
            (None, _) => return Err(LoadError::missing(format!("buffer {i}"), "uri")),
        }
    }

    let fetches = uris.into_iter().map(|uri| async move {
        let Some(uri) = uri else {
            return Ok(glb_bin.unwrap_or_default().to_vec());
        };
        let data = match decode_data_uri(uri) {
            Some(decoded) => decoded,
            None => source.fetch(uri).await,
        };
        data.map_err(|source| LoadError::BufferFetch {
            uri: uri.to_string(),
            source,
        })
    });
    let fetched = future::try_join_all(fetches).await?;

    let mut buffers = Vec::with_capacity(descs.len());
    for (i, (desc, mut data)) in descs.iter().zip(fetched).enumerate() {
        if data.len() < desc.byte_length {
            return Err(LoadError::OutOfBounds {
                object: format!("buffer {i}"),
                required: desc.byte_length,
                available: data.len(),
            });
        }
        // GLB chunks and some exporters pad the data, the declared length is
        // what views are validated against.
        data.truncate(desc.byte_length);
        log::debug!("loaded buffer {i} ({} bytes)", data.len());
        buffers.push(Rc::new(Buffer::new(data, desc.name.clone())));
    }
    Ok(buffers)
}
