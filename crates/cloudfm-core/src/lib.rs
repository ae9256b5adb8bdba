//! Cloud File Manager Core - Provider abstraction and dialog workflow
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `CloudMetadata`, `CloudContent`, `Capabilities`, `AuthGate`
//! - **Use cases** - `FileDialogTab`, `TabbedDialog`, `ProviderRegistry`, `CloudFileManager`
//! - **Port definitions** - Traits for adapters: `ICloudProvider`, `IHostClient`, `IKeyValueStore`
//! - **SDK loader** - One-time shared bootstrap for provider SDKs
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod loader;
pub mod ports;
pub mod usecases;
