//! Cryptographic utilities
//!
//! - KMAC: domain-separated KMAC256 (SHAKE256) hashing and XOF

#![forbid(unsafe_code)]

pub mod kmac;
