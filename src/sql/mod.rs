pub mod builder;
pub mod hooks;
pub mod params;
pub mod router;

pub use builder::*;
pub use hooks::*;
pub use params::*;
pub use router::*;
