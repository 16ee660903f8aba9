pub mod probe;
pub mod validate;
