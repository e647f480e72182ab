//! Configuration for table reconciliation sessions.
//!
//! [`shared`] holds the serde types describing a session, [`load`] the layered loader that
//! reads them from configuration files and `APP_`-prefixed environment variables.

pub mod load;
pub mod shared;
