pub mod adapters;
pub mod config;
pub mod fs;
pub mod listing;
pub mod model;
pub mod normalize;
pub mod util;
