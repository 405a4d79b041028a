// Data processing pipeline: batches, portal catalogs, processing stages, rule extraction and export

pub mod batch;
pub mod catalog;
pub mod export;
pub mod processing;
pub mod rules;
