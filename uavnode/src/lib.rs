//! # uavnode
//!
//! This library implements the protocol engine of a UAVCAN v0 \[1\] sensor node over CAN in
//! no_std environments. All state lives in fixed-capacity storage and no dynamic memory
//! allocation is required.
//!
//! The engine is a cooperative main loop. The only code running in interrupt context is the
//! timer tick that feeds [`scheduler::TickSource`].
//!
//! ## Architecture
//!
//! ```text
//!               ┌────────┐      ┌────────────┐
//!               │ Runner │◄─────┤ TickSource │◄── 10 Hz timer ISR
//!               └────┬───┘      └────────────┘
//!                    ▼
//!   ┌──────────────────────────────────────────────┐
//!   │ Node                                         │
//!   │  ┌───────────┐  ┌──────────────┐  ┌───────┐  │
//!   │  │ Allocator │  │ Housekeeping │  │ Fault │  │
//!   │  └─────┬─────┘  └──────┬───────┘  └───────┘  │
//!   │        ▼               ▼                     │
//!   │  ┌─────────────────────────────┐             │
//!   │  │ Context                     │◄─┐          │
//!   │  │  Registers  Transport(Pool) │  │          │
//!   │  └──────────────┬──────────────┘  │          │
//!   │                 ▼                 │          │
//!   │  ┌───────────┐  transfers  ┌──────┴─────┐    │
//!   │  │ FramePump ├────────────►│ Dispatcher │    │
//!   │  └─────┬─────┘             └────────────┘    │
//!   └────────┼─────────────────────────────────────┘
//!            ▼
//!     embedded_can::nb::Can
//! ```
//! Components:
//! * _Node_ owns all engine state and runs one main loop iteration per `poll`.
//! * _Context_ holds the configuration, the register store, the local node ID and the
//!   transport.
//! * _Transport_ segments outbound transfers into queued frames and reassembles inbound ones.
//!   Both directions share one block pool.
//! * _Allocator_ negotiates a node ID with the bus allocator when none is configured.
//! * _Dispatcher_ filters inbound transfers before reassembly and routes completed ones.
//! * _Housekeeping_ runs the 1 Hz tasks: stale transfer cleanup, pool statistics, NodeStatus.
//! * _FramePump_ moves frames between the transport and the CAN controller.
//! * _Fault_ halts the node on an invariant violation and blinks the error code.
//!
//! ## Limitations
//!
//! * Only NodeStatus, GetNodeInfo and dynamic node ID allocation (allocatee side) are served.
//! * Inbound transfers are limited to 128 bytes.
//! * CAN 2.0B only; CAN FD frames are not supported.
//!
//! # References:
//!
//! * \[1\] UAVCAN v0 Specification
//!   <https://legacy.uavcan.org/Specification/>
#![no_std]

pub use uavnode_core as core;
pub use uavnode_driver as driver;
pub use uavnode_driver::{frame, time};
pub use uavnode_encoding as encoding;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod allocator;
pub mod config;
pub mod context;
pub mod data_types;
pub mod dispatcher;
pub mod fault;
pub mod format;
pub mod housekeeping;
pub mod node;
pub mod pool;
pub mod pump;
pub mod registers;
pub mod scheduler;
pub mod transport;
