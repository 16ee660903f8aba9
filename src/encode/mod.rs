pub mod metadata;
pub mod quantize;
