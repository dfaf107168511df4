//! Version-bearing fields of a module: enumeration and write-back.

pub mod image;
pub mod sync;

pub use image::{replace_capture, split_image, ImageRef};
pub use sync::{DependencySync, CONTAINER_VERSION_PATTERN, POD_CONTAINERS_PATH};
