pub mod categories;
pub mod client;
pub mod dashboard;
pub mod enums;
pub mod file;
pub mod pipeline;
pub mod project;
pub mod review;

pub use categories::*;
pub use client::*;
pub use dashboard::*;
pub use enums::*;
pub use file::*;
pub use pipeline::*;
pub use project::*;
pub use review::*;
