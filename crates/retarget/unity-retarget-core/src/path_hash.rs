//! Path hashing used by Unity clips to address transforms and properties.
//!
//! A transform path is the slash-joined chain of names below the animator
//! root (the root's immediate children are encoded by their name alone). The
//! hash is the standard CRC-32 (ISO-HDLC / zlib polynomial) of the UTF-8 bytes.

use crc::{Crc, CRC_32_ISO_HDLC};

pub type PathHash = u32;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 of the UTF-8 encoding of `path`.
#[inline]
pub fn path_hash(path: &str) -> PathHash {
    CRC32.checksum(path.as_bytes())
}

/// Hash of a named float property (light parameters, user floats).
#[inline]
pub fn property_hash(name: &str) -> u32 {
    path_hash(name)
}

/// Hash Unity uses for a blend-shape weight on a skinned mesh.
#[inline]
pub fn blend_shape_hash(shape: &str) -> u32 {
    path_hash(&format!("blendShape.{shape}"))
}

/// Append `name` to `parent`, treating an empty parent as the animator root.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        let mut out = String::with_capacity(parent.len() + 1 + name.len());
        out.push_str(parent);
        out.push('/');
        out.push_str(name);
        out
    }
}

/// Last '/'-separated segment of a path.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
