//! IO
//!
//! JSON persistence shared by configuration values and calibration stores.
use crate::errors::ConformalError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::Path;

pub trait JsonIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConformalError> {
        fs::write(path, self.json_dump()?).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json object.
    fn json_dump(&self) -> Result<String, ConformalError> {
        serde_json::to_string(self).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Load from a json string.
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, ConformalError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| ConformalError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConformalError> {
        let json_str = fs::read_to_string(path).map_err(|e| ConformalError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}
