//! Viewer registry for stream fan-out
//!
//! The registry tracks live viewer connections and fans encoded chunks out
//! to them. Each viewer owns a bounded queue drained by its own writer task,
//! so a slow or broken viewer never stalls the broadcaster or other viewers.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ViewerRegistry>
//!                     ┌─────────────────────────┐
//!                     │ viewers: HashMap<Id,    │
//!                     │   ViewerEntry {         │
//!                     │     tx: mpsc::Sender,   │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!   [Broadcaster]            [Viewer task]           [Viewer task]
//!   read(512)                chunks.recv()           chunks.recv()
//!         │                       │                       │
//!         └──► registry.broadcast()──► ws.send() ──► TCP
//! ```
//!
//! # Slow viewers
//!
//! `broadcast` never waits on a viewer. A viewer whose queue is full is
//! evicted and disconnected, so every viewer that stays connected has seen
//! every chunk since it joined, in order.

pub mod config;
pub mod entry;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{BroadcastOutcome, ViewerEntry, ViewerInfo, ViewerSubscription};
pub use frame::ViewerId;
pub use store::ViewerRegistry;
