// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 dmbus contributors

//! # dmbus - Data-Model Bus
//!
//! An inter-process data-model bus for embedded device software. Components
//! register dotted data-model elements (`Device.WiFi.SSID.1.Name`), serve
//! them through typed callbacks, and consume each other's parameters,
//! tables, and events over a pluggable transport.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dmbus::{Bus, DataElement, PropertyHandlers, Result, Value};
//!
//! fn main() -> Result<()> {
//!     let bus = Bus::local();
//!
//!     // Provider: register a read-only parameter
//!     let provider = bus.open("acme.provider")?;
//!     provider.register_data_elements(&[DataElement::property(
//!         "Device.Acme.Model",
//!         PropertyHandlers::read_only(|_, _, _| Ok(Value::String("X-2000".into()))),
//!     )])?;
//!
//!     // Consumer: read it back
//!     let consumer = bus.open("acme.consumer")?;
//!     let model = consumer.get_string("Device.Acme.Model")?;
//!     println!("model = {model}");
//!
//!     consumer.close()?;
//!     provider.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------------+
//! |                         Component API                             |
//! |      Bus -> Handle (get/set, tables, events, sessions)            |
//! +-------------------------------------------------------------------+
//! |                         Provider Core                             |
//! |   Element Tree | Subscription Registry | Value-Change Detection   |
//! +-------------------------------------------------------------------+
//! |                          RPC + Codec                              |
//! |   Method dispatch | TLV marshalling | Legacy type decoding        |
//! +-------------------------------------------------------------------+
//! |                           Transport                               |
//! |        In-process router (LocalTransport) | Custom impls          |
//! +-------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bus`] | Entry point: owns the transport and the component registry |
//! | [`Handle`] | One component's connection; provider and consumer API |
//! | [`DataElement`] | A registration entry: dotted name plus callbacks |
//! | [`Value`] | Tagged parameter value (bool, integers, strings, ...) |
//! | [`Event`] | A published occurrence: value change, row add, ... |
//!
//! ## Wildcards and Tables
//!
//! Names ending in `.` or containing `*` are wildcard queries and expand
//! to every readable parameter below the match. Multi-instance tables
//! register as `Device.X.Tbl.{i}.`; rows are addressed by instance number
//! (`Tbl.1.`) or alias (`Tbl.[name].`).
//!
//! ## See Also
//!
//! - [TR-181 Device Data Model](https://usp-data-models.broadband-forum.org/)
//! - [TR-069 Parameter Naming](https://www.broadband-forum.org/technical/download/TR-069.pdf)

/// Bus entry point and the process-wide component registry.
pub mod bus;
/// TLV marshalling between typed values and wire messages.
pub mod codec;
/// Tunables: timeouts, polling period, runtime override files.
pub mod config;
/// Registration tree: element nodes, tables, instance resolution.
pub mod element;
/// Error taxonomy shared by every bus operation.
pub mod error;
/// Events, the provider-side subscription registry, change detection.
pub mod event;
/// A component's connection: provider and consumer operations.
pub mod handle;
/// Request dispatch and the consumer-side call implementations.
mod rpc;
/// Transport abstraction and the in-process reference router.
pub mod transport;
/// Tagged values, properties, and object trees.
pub mod value;

pub use bus::{Bus, MAX_COMPONENTS, MAX_HANDLES};
pub use config::Config;
pub use element::{
    AddRowHandler, DataElement, ElementKind, EventHandlers, GetHandler, GetHandlerOptions,
    PropertyHandlers, RemoveRowHandler, SetHandler, SetHandlerOptions, SubscribeAction,
    SubscribeHandler, TableHandlers,
};
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use handle::{EventCallback, EventSubscription, Handle, SetOptions};
pub use transport::{InboundHandler, LocalTransport, Message, Transport};
pub use value::{Object, ObjectKind, Property, TimeVal, Value};

/// Library version string.
pub const VERSION: &str = "0.4.2";

#[cfg(test)]
mod tests {
    #[test]
    fn test_version_matches_manifest() {
        assert_eq!(crate::VERSION, env!("CARGO_PKG_VERSION"));
    }
}
