use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to import glTF {path}: {source}")]
    Gltf {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported image format {0}")]
    UnsupportedImage(String),

    #[error("loading {0} panicked")]
    LoadPanicked(PathBuf),

    #[error("{0} contains no triangle geometry")]
    EmptyModel(PathBuf),

    #[error("unknown control '{0}'")]
    UnknownControl(String),

    #[error("invalid value '{value}' for control '{id}'")]
    InvalidControlValue { id: String, value: String },

    #[error("no model at index {index}, {count} configured")]
    ModelIndex { index: usize, count: usize },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}
