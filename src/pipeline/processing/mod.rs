// Row processing: decode the upload, normalize columns, join in reference data

pub mod enrich;
pub mod normalize;
pub mod spreadsheet;
