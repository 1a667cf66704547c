/// Column and resource names shared across the pipeline stages

// Free-text column rewritten into {"male", "female", null}
pub const SEX_COLUMN: &str = "sex";
pub const SEX_FEMALE: &str = "female";
pub const SEX_MALE: &str = "male";

// Required columns of the postal reference CSV
pub const REFERENCE_POSTAL_COLUMN: &str = "pincode";
pub const REFERENCE_CITY_COLUMN: &str = "regionname";

// Defaults for the enrichment join when `[enrichment]` is omitted
pub const DEFAULT_POSTAL_COLUMN: &str = "pincode";
pub const DEFAULT_CITY_COLUMN: &str = "city";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "SHOPPER_INGEST_CONFIG";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

pub const GCS_SCHEME: &str = "gs://";

// Prefix for the temporary object written before promotion onto the target key
pub const STAGED_OBJECT_PREFIX: &str = ".incoming-";
