pub mod cli;
pub mod collectors;
pub mod database;
pub mod integration;

#[allow(clippy::all, clippy::pedantic)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
