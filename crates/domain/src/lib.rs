//! # minicam-domain
//!
//! Pure domain model for the minicam camera provider.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers and error conventions
//! - Define **Devices** (cameras and doorbells discovered from an upstream account)
//! - Define **Capabilities** (camera, video stream, motion sensor, binary sensor, intercom)
//! - Define **Credentials** (account secret material and login outcomes)
//! - Define **Stream sessions** (outbound video / inbound audio and their state machine)
//! - Define **Triggers** (motion and doorbell pulses turned into timed levels)
//! - Define **Settings** and **Events** exchanged with the host platform
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod capability;
pub mod credential;
pub mod device;
pub mod event;
pub mod media;
pub mod setting;
pub mod stream;
pub mod trigger;
