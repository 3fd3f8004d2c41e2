//! Storefront cart and checkout service library.
//!
//! This crate provides the storefront functionality as a library,
//! allowing it to be tested and reused by the binary and the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod seed;
pub mod services;
pub mod state;
