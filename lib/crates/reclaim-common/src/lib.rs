pub mod run_keys;
pub mod status;
pub mod types;

pub use run_keys::{
    DEFAULT_REGION, DEFAULT_STATE_NAMESPACE, keys, run_key, state_key, ttl, validate_region,
    validate_run_id, validate_state_key,
};
pub use status::{RunStatus, StatusVocabulary};
pub use types::*;
