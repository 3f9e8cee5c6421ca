//! Shared test infrastructure.

pub(crate) mod db;
