pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod poll;
pub mod report;
pub mod search;
