pub mod ports;
pub mod ingest_use_case;
