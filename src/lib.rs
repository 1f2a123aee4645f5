pub mod cache;
pub mod cli;
pub mod config;
pub mod history;
pub mod hooks;
pub mod limiter;
pub mod prober;
pub mod runner;
pub mod targets;

#[cfg(test)]
mod tests;
