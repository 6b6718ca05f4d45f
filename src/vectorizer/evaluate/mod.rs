pub mod matcher;
pub mod scoring;
