use crate::gltf::LoadError;

const MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;
const HEADER_LENGTH: usize = 12;

/// The two chunks of a binary glTF file.
pub struct Glb<'a> {
    pub json: &'a str,
    pub bin: Option<&'a [u8]>,
}

impl<'a> Glb<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Glb<'a>, LoadError> {
        if read_u32(bytes, 0) != Some(MAGIC) {
            return Err(LoadError::Glb("not a binary glTF file"));
        }
        let version = read_u32(bytes, 4).ok_or(LoadError::Glb("truncated header"))?;
        if version != 2 {
            return Err(LoadError::UnsupportedVersion(format!("{version} (GLB container)")));
        }
        let length = read_u32(bytes, 8).ok_or(LoadError::Glb("truncated header"))? as usize;
        let bytes = bytes
            .get(..length)
            .ok_or(LoadError::Glb("file is shorter than its header says"))?;

        let mut json = None;
        let mut bin = None;
        let mut offset = HEADER_LENGTH;
        while offset < bytes.len() {
            let (Some(chunk_length), Some(chunk_type)) =
                (read_u32(bytes, offset), read_u32(bytes, offset + 4))
            else {
                return Err(LoadError::Glb("truncated chunk header"));
            };
            let start = offset + 8;
            let end = start + chunk_length as usize;
            let data = bytes
                .get(start..end)
                .ok_or(LoadError::Glb("truncated chunk"))?;
            match chunk_type {
                CHUNK_JSON if offset == HEADER_LENGTH => json = Some(data),
                CHUNK_BIN if json.is_some() && bin.is_none() => bin = Some(data),
                _ => log::debug!("skipping GLB chunk of type {chunk_type:#010x}"),
            }
            offset = end;
        }

        let json = json.ok_or(LoadError::Glb("the first chunk must be JSON"))?;
        let json = std::str::from_utf8(json).map_err(|_| LoadError::Glb("JSON chunk is not UTF-8"))?;
        // The JSON chunk is padded to 4 bytes with spaces, some exporters use
        // zeroes instead.
        let json = json.trim_end_matches(|c: char| c == ' ' || c == '\0');
        Ok(Glb { json, bin })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let bytes = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}
