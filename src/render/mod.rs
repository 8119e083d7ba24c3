pub mod composite;
pub mod leaf;
