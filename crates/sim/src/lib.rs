pub mod geo;
pub mod neighbors;
pub mod observation;
pub mod policy;
pub mod rules;
pub mod decoder;
pub mod control_loop;
pub mod traffic;
pub mod scenario;
pub mod analyzer;

pub use control_loop::*;
pub use decoder::*;
pub use policy::*;
pub use scenario::*;
pub use traffic::*;
