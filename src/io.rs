//! Reading inputs from and writing results to YAML or JSON files
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error(
        "Invalid serialized type `{0}`. Options are `yaml`, `yml`, and \
        `json`."
    )]
    SerializedTypeInvalid(String),
    #[error("IoError: {0}")]
    Io(#[from] io::Error),
    #[error("YamlError: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
}

/// File formats, chosen by extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerializedType {
    Yaml,
    Json,
}

impl FromStr for SerializedType {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(IoError::SerializedTypeInvalid(s.to_owned())),
        }
    }
}

fn serialized_type_from_path<P: AsRef<Path>>(
    path: &P,
) -> Result<SerializedType, IoError> {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            IoError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Invalid file type",
            ))
        })
        .and_then(SerializedType::from_str)
}

/// Write `obj` to `path` in the format named by its extension
pub fn serialize_obj<T, P>(obj: &T, path: P) -> Result<(), IoError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let bytes = match serialized_type_from_path(&path)? {
        SerializedType::Yaml => serde_yaml::to_string(&obj)?.into_bytes(),
        SerializedType::Json => serde_json::to_vec_pretty(&obj)?,
    };
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path.as_ref())?;
    let mut writer = io::BufWriter::new(file);
    writer.write_all(&bytes)?;
    info!("wrote {}", path.as_ref().display());
    Ok(())
}

/// Read an object from `path` in the format named by its extension
pub fn deserialize_file<T, P>(path: P) -> Result<T, IoError>
where
    for<'de> T: Deserialize<'de>,
    P: AsRef<Path>,
{
    let serialized_type = serialized_type_from_path(&path)?;
    let mut file = fs::File::open(path.as_ref())?;
    let mut ser = String::new();
    file.read_to_string(&mut ser)?;
    info!("read {}", path.as_ref().display());
    match serialized_type {
        SerializedType::Yaml => Ok(serde_yaml::from_str(&ser)?),
        SerializedType::Json => Ok(serde_json::from_str(&ser)?),
    }
}
