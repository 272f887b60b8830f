use super::definition::SigilDefinition;
use crate::error::PersistError;
use crate::sigil::Sigil;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

/// A set of converted sigils stored in one binary file.
///
/// Loading a bundle skips JSON parsing and conversion at server start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigilBundle {
    pub sigils: Vec<Sigil>,
}

impl SigilBundle {
    pub fn new(sigils: Vec<Sigil>) -> Self {
        Self { sigils }
    }

    /// Converts authored definitions, failing on the first bad one.
    pub fn from_definitions(definitions: Vec<SigilDefinition>) -> Result<Self, PersistError> {
        let sigils = definitions
            .into_iter()
            .map(SigilDefinition::into_sigil)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { sigils })
    }

    pub fn get(&self, id: &str) -> Option<&Sigil> {
        self.sigils.iter().find(|s| s.id == id)
    }

    /// Shared handles, ready to socket into items.
    pub fn into_shared(self) -> Vec<Arc<Sigil>> {
        self.sigils.into_iter().map(Arc::new).collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        encode_to_vec(self, standard()).map_err(|e| PersistError::Encode(e.to_string()))
    }

    /// Saves the bundle in the bincode format.
    pub fn save(&self, path: &str) -> Result<(), PersistError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|source| PersistError::Io {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_file(path: &str) -> Result<Self, PersistError> {
        let bytes = fs::read(path).map_err(|source| PersistError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        decode_from_slice(bytes, standard())
            .map(|(bundle, _)| bundle) // (value, bytes read)
            .map_err(|e| PersistError::Decode(e.to_string()))
    }
}
