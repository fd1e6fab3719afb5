//! DashboardService (`spec.md` §4.8, C10): a long-lived process that mounts
//! the store read-only, serving roll-ups and entity lists over HTTP and
//! streaming `ChangeBus` events over a one-way push channel.

mod http;
mod protocol;

pub use http::Dashboard;
pub use protocol::ResumeToken;
