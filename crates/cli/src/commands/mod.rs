pub mod analyze;
pub mod inspect;
pub mod spec;

pub use analyze::*;
pub use inspect::*;
pub use spec::*;
