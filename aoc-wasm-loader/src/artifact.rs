// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Binary artifact read from disk

use crate::error::{LoaderError, LoaderResult};
use std::path::{Path, PathBuf};

/// The raw bytes of a compiled module, read once at load time
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    bytes: Vec<u8>,
    digest: String,
}

impl Artifact {
    /// Read the whole artifact file into memory
    pub fn read(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|source| LoaderError::ArtifactRead {
            path: path.clone(),
            source,
        })?;
        Ok(Self::from_bytes(path, bytes))
    }

    /// Wrap bytes that were obtained some other way
    pub fn from_bytes(path: PathBuf, bytes: Vec<u8>) -> Self {
        let digest = hex::encode(blake3::hash(&bytes).as_bytes());
        Self {
            path,
            bytes,
            digest,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// BLAKE3 digest of the bytes, hex encoded
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Cheap sniff for the `\0asm` preamble
    pub fn has_wasm_magic(&self) -> bool {
        self.bytes.starts_with(b"\0asm")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Artifact::read(dir.path().join("absent.wasm")).unwrap_err();
        match err {
            LoaderError::ArtifactRead { path, source } => {
                assert!(path.ends_with("absent.wasm"));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_read_records_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wasm");
        std::fs::write(&path, b"\0asm\x01\0\0\0").unwrap();

        let artifact = Artifact::read(&path).unwrap();
        assert_eq!(artifact.len(), 8);
        assert!(artifact.has_wasm_magic());
        assert_eq!(artifact.digest().len(), 64);
        assert_eq!(
            artifact.digest(),
            Artifact::from_bytes(PathBuf::new(), b"\0asm\x01\0\0\0".to_vec()).digest()
        );
    }

    #[test]
    fn test_text_is_not_magic() {
        let artifact = Artifact::from_bytes(PathBuf::from("x"), b"(module)".to_vec());
        assert!(!artifact.has_wasm_magic());
        assert!(!artifact.is_empty());
    }
}
