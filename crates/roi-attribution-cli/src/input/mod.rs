pub mod file;
pub mod normalize;
pub mod stdin;
