//! syxsend pushes a list of 32-bit values to a MIDI device as System
//! Exclusive data. The values come from `0x...` literals in a text file (a C
//! array dump, a register table) or from the samples of a mono 32-bit WAV
//! file.
//!
//! SysEx data bytes only carry 7 bits, so every value is split into five
//! 7-bit bytes by the [encoder]. The payload is then wrapped in `F0 <id> ...
//! F7` frames by the [chunk_planner] and delivered by [transmission], which
//! starts with one large message and falls back to paced chunk frames, then
//! to single bytes, when a device or driver refuses it.
//!
//! Devices are reached through the [transport] traits: MIDI ports via
//! `midir`, raw MIDI over a serial line, or a `.syx` file for offline use.
//! [pipeline] ties the steps together, and the `syxsend` binary puts a
//! command line (and a small terminal port picker) in front of it.

#![warn(missing_docs)]
pub mod args;
pub mod chunk_planner;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gui;
pub mod interrupt;
pub mod pacing;
pub mod pipeline;
pub mod transmission;
pub mod transport;
pub mod value_source;
