//! HTTP handlers

pub mod admin;
pub mod attempts;
pub mod health;
