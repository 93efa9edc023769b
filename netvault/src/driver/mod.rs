//! Per-device dialog driver.
//!
//! The driver layer runs the login, enable, pager and command phases of a
//! model over an open session and turns the outcome into a
//! [`FetchResult`].

mod capture;
mod dialog;
mod fetch;
mod response;

pub use capture::Capture;
pub use dialog::{Credentials, Dialog};
pub use fetch::{fetch, FetchContext};
pub use response::{FetchCode, FetchResult};
