//! Template rendering from a module's config into `dist/`.

pub mod normalize;
pub mod renderer;
pub mod substitute;

pub use normalize::{stringify_env_values, Yaml11Quoter};
pub use renderer::{RenderedSet, Renderer, TemplateFailure};
pub use substitute::Substituter;
