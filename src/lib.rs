#![warn(clippy::pedantic)]
// Noisy doc/signature lints that would require annotating most pub functions
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference: keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Retry counters and row limits cross u32/u64/usize seams
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// chats::ChatFetcher, filter::ContentFilter and friends read better qualified
#![allow(clippy::module_name_repetitions)]

pub mod chats;
pub mod cli;
pub mod compose;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod filter;
pub mod fingerprint;
pub mod ingest;
pub mod keys;
pub mod model;
pub mod retry;
pub mod storage;
pub mod ui;
pub(crate) mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
