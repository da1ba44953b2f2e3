//! Domain services used by the websocket route.
//!
//! ARCHITECTURE
//! ============
//! Service modules own membership and fan-out logic so the route handler can
//! stay focused on socket I/O and frame decoding.

pub mod directory;
pub mod lifecycle;
pub mod registry;
pub mod relay;
