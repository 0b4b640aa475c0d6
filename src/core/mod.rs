//! Policy resolution and enforcement core
//!
//! - [`annotation`]: the closed set of security markers
//! - [`descriptor`]: typed group / operation descriptors
//! - [`discovery`] and [`catalog`]: where descriptors come from
//! - [`config`]: the default-deny flag
//! - [`resolver`]: method-over-group precedence and default-deny fallback
//! - [`enforcement`]: per-request checks against a caller identity
//! - [`registrar`]: once-per-operation registration into a route table

pub mod annotation;
pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod discovery;
pub mod enforcement;
pub mod error;
pub mod registrar;
pub mod resolver;
