pub mod analytic;
pub mod mixer;
pub mod resample;
pub mod source;
