pub mod contract;
pub mod image;
pub mod preferences;
pub mod recommendation;
