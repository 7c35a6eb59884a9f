//! Cooperative, single-threaded building blocks for audio voice-service
//! runtimes: a reactor (signals, timers, fd watches), an audio pipe
//! contract with a back-pressure-aware fan-out splitter, a Goertzel tone
//! detector, and a hierarchical finite state machine.
//!
//! Every piece here assumes one thread drives the reactor loop; none of
//! the types are `Send`/`Sync`. Byte-stream I/O adapters and real OS event
//! integration are left to the embedder, per the boundary contract
//! documented on [`reactor`].

pub mod error;
pub mod pipe;
pub mod reactor;
pub mod state_machine;
pub mod tone_detector;

pub use error::CoreError;
