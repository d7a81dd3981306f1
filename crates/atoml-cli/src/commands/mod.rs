pub mod build_model;
pub mod screen;
pub mod split;
