pub mod normals;
pub mod observations;
