//! meshctl: command-line client for Meshery service mesh management.
//!
//! Implements `validate`: trigger a conformance run of a service mesh
//! against a standard specification (SMI) on the Meshery server, and
//! optionally watch the server's event feed until the run settles.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod events;
pub mod logging;
pub mod operation;
pub mod session;
pub mod token;
pub mod validate;
