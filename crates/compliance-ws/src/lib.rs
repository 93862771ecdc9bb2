//! Real-Time Collaboration Fabric: connection pool, subscription routing,
//! fan-out queues, heartbeat, and liveness. Generalizes
//! `AntifragileEngine`'s per-service-keyed `RwLock<HashMap<...>>` registry
//! (`packages/pillars/arbiter/src/antifragile.rs`) to per-connection outbound
//! queues with a dedicated serializer per connection.

mod fabric;
mod sink;

pub use fabric::{Fabric, FabricConfig};
pub use sink::TransportSink;
