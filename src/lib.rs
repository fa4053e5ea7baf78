//! Ration Library
//!
//! Core functionality for grocery, dish, diet and meal nutrition tracking.

pub mod build_info;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod nutrition;
pub mod tools;
