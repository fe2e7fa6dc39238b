pub mod feeds;
pub mod run;
