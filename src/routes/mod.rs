//! Route modules for PDF Toolbox Server

pub mod files;
pub mod health;
pub mod transform;
