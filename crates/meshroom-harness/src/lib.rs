//! Meshroom Harness
//!
//! In-memory implementation of the peer transport, so coordinators can be driven
//! end to end without a network: integration tests, the CLI simulator and local
//! experiments all run on a shared `MemoryMesh`.

pub mod mesh;

pub use mesh::{random_peer_id, MemoryMesh, MemoryRoomHandle, MemoryTransport, MeshStats, PEER_ID_LEN};
