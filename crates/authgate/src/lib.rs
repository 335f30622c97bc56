//! An OpenID Connect Authorization-Code authentication filter, run behind a
//! sidecar proxy's external-authorization check interface.
//!
//! On each inbound request the filter chain decides one of three outcomes:
//! allow the request through with injected identity headers, redirect the
//! user-agent to the IdP to begin authentication, or complete the
//! authorization-code exchange and redirect to a landing page with encrypted
//! session cookies installed.

pub mod check;
pub mod client;
pub mod config;
pub mod filters;
pub mod http;
pub mod random;
pub mod service;
pub mod session;
