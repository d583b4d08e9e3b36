//! # MSP Protocol Module
//!
//! Implementation of the MultiWii Serial Protocol (v1) frame layer.
//!
//! This module handles:
//! - Frame encoding (`$M<` header, length, code, payload, XOR checksum)
//! - Frame decoding with header synchronisation and checksum validation
//! - The message catalog: code classes and payload field layouts

pub mod catalog;
pub mod checksum;
pub mod decoder;
pub mod encoder;
pub mod protocol;
