mod models;
mod root;
mod run;
mod serve;

pub use root::Cli;
