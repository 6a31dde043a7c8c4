//! # Sonar Link Library
//!
//! Connect to a wireless fishfinder sonar, decode its telemetry and log the
//! depth samples that matter.
//!
//! This library provides the link state machine, the Erchang wire protocol, the
//! significance filter that decimates the sample stream, and a rotating sample
//! log. The wireless transport is supplied by the host through the
//! [`transport::Transport`] trait; a bench simulator is included.

pub mod config;
pub mod error;
pub mod link;
pub mod location;
pub mod protocol;
pub mod sample;
pub mod telemetry;
pub mod transport;
