pub mod generation;
pub mod stance;
pub(crate) mod utils;

pub use utils::DeviceRequest;
