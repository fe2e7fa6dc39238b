pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

pub fn run() -> LogCtx<ops::run::Run> { LogCtx::new(config::logs_are_json()) }
pub fn feeds() -> LogCtx<ops::feeds::Feeds> { LogCtx::new(config::logs_are_json()) }
