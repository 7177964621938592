pub mod assets;
pub mod config;
pub mod controls;
pub mod environment;
pub mod error;
pub mod glb;
pub mod hdr;
pub mod model;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod viewer;

pub use error::{Error, Result};
pub use viewer::Viewer;
