pub mod backend;
pub mod celebration;
pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod crud;
pub mod cursor;
pub mod deck;
pub mod error;
pub mod grading;
pub mod item;
pub mod ledger;
pub mod palette;
pub mod quiz;
pub mod session;
pub mod utils;
