//! Blog 'em Ipsum: a terminal client for a remote post service, built on an
//! in-process query cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod presentation;
