//! The host side of a measurement: types the keys and reports when it did.

pub mod adb;
pub mod injector;
pub mod server;

pub use injector::{injector_from_settings, CommandInjector, DryRunInjector, KeyInjector};
pub use server::{KeyPressPlan, TimestampHost};
