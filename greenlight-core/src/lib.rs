pub mod error;
pub mod request;

pub use error::ValidationError;
pub use request::{
    Decision, DecisionToken, Request, RequestId, RequestStatus, RequestSubmission,
};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn get_service_version() -> String {
    // First check for git hash from the deployment build environment
    if let Some(git_hash) = option_env!("GREENLIGHT_GIT_HASH") {
        if git_hash.len() >= 8 {
            git_hash[..8].to_string()
        } else {
            git_hash.to_string()
        }
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        // Fall back to built crate's git detection (for cargo builds)
        if git_hash.len() >= 8 {
            git_hash[..8].to_string()
        } else {
            git_hash.to_string()
        }
    } else {
        "unknown".to_string()
    }
}
