pub mod clean;
pub mod inspect;
pub mod layout;
pub mod stats;

pub use clean::{clean, CleanReport};
pub use inspect::{CacheInspector, CacheState, Readiness};
pub use layout::CacheLayout;
pub use stats::{format_bytes, CacheReport};
