//! Shared test infrastructure.

pub mod db;
pub mod helpers;
