// Modular tools
pub mod batch;
pub mod fetch;
pub mod links;
pub mod section;
