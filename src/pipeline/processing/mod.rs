// Pipeline processing: normalization, missing values, merging, validation and reporting

pub mod normalize;
pub mod missing;
pub mod conflation;
pub mod quality_gate;
pub mod report;
