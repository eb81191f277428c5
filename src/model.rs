pub mod fs;
pub mod object;
