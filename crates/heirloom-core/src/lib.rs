pub mod asset;
pub mod auth;
pub mod constants;
pub mod error;
pub mod event;
pub mod guardian;
pub mod types;
pub mod will;

pub use asset::*;
pub use auth::{Auth, Role};
pub use constants::*;
pub use error::{ErrorKind, HeirloomError};
pub use event::{Event, EventRecord};
pub use guardian::GuardianProfile;
pub use types::*;
pub use will::{equal_shares, Will};
