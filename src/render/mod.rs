//! Rendering: descriptor -> CloudFormation template document.

pub mod template;

pub use template::render_template;
