//! Session state of the dashboard: who is authenticated, who is in the
//! middle of authorizing, and where credentials are kept between runs.

mod cache;
mod handoff;
mod session;
mod store;

pub use cache::CredentialCache;
pub use handoff::{AuthHandoff, Claim, Delivery, HandoffOutcome, HandoffState, PendingLogin};
pub use session::{Ack, Acquired, AuthSession, REFRESH_MARGIN, RequestContext};
pub use store::{FileTokenStore, MemoryTokenStore, StoredToken, TokenFields, TokenStore};
