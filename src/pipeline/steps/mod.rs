// Deploy steps: write the cleaned CSV, then read it back through the warehouse

pub mod export;
pub mod validate;
