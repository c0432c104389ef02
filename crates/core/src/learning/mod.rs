mod functions;
mod types;

pub use functions::{
    calculate_expiry, clamp_percentage, completion_percentage, generate_session_id,
    generate_user_id, is_session_expired,
};
pub use types::{
    Analytics, IdentityIndex, Preferences, Profile, Progress, ProgressUpdate, Session, SessionId,
    UserSummary,
};
