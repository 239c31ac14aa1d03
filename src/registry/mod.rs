//! Session registry: the single owner of authentication and dialogue state
//!
//! Both long-lived tasks (event dispatch and the periodic monitor) consult
//! the same registry task through cloneable handles:
//! - **Auth state:** who is anonymous, mid-login, or authenticated
//! - **Dialogue transitions:** each login step is one atomic message
//! - **Broadcast targets:** the explicit subscription set for alerts

mod core;
mod handle;
mod messages;

pub use core::SessionRegistry;
pub use handle::RegistryHandle;
pub use messages::{
    AuthState, DialogueStep, Identity, LoginStart, RegistryMetrics, RegistryRequest, UserSession,
};
