pub extern crate glam;
#[cfg(feature = "wgpu")]
pub extern crate wgpu;

pub mod context;
pub mod device;
pub mod error;
pub mod fill;
mod flatten;
pub mod matrix;
pub mod path;
pub mod pattern;
pub mod renderer;
pub mod stroke;
pub mod utils;
pub mod vertex;
#[cfg(feature = "wgpu")]
pub mod wgpu_renderer;

pub use context::{Config, Context};
pub use device::{Device, Surface};
pub use error::Error;
pub use matrix::Matrix;
pub use pattern::{Color, Extend, Pattern};
