use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Trait for configuration sections: each section knows its TOML table name
/// and validates itself before a run starts.
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<()>;
}
