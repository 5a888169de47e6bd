// src/lib.rs
// Cascading filter engine: dependent filters whose selectable values are
// narrowed by their parents' selections, resolved from SQL tables

pub mod cli;
pub mod database;
pub mod export;
pub mod filters;
pub mod settings;
