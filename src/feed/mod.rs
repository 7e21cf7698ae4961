//! Balance feeds from external venue fetchers.
//!
//! The controller never talks to a venue. Fetchers implement
//! [`BalanceSource`] and the [`BalancePoller`] pushes what they report into
//! the controller.

mod file;
mod mock;
mod poller;
mod traits;

pub use file::FileBalanceSource;
pub use mock::MockBalanceSource;
pub use poller::{BalancePoller, PollReport};
pub use traits::BalanceSource;
