//! chatca keybase - Keybase chat as the transport for chatca
//!
//! Every operation shells out to the `keybase` binary's JSON API
//! (`chat api`, `team api`, `kvstore api`) and the subscription reads the
//! line-delimited events of `keybase chat api-listen`.

pub mod channel;
pub mod cli;
pub mod wire;

pub use channel::KeybaseChannel;
pub use cli::{KeybaseCli, KeybaseOptions};
