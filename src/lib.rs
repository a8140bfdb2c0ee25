//! Procedural road network generation over seeded heightmaps.
//!
//! Roads are traced across an infinite, deterministic height field by a
//! weighted best-first search that hugs smooth, low terrain. Networks of
//! roads are generated lazily per region, persisted as compact binary
//! records, and served through bounded in-memory caches:
//!
//! - [`RoadMap`] - the shared access point: caches, seed, persistence
//! - [`RoadGenerator`] - traces networks of roads over a height field
//! - [`HeightSource`] - the terrain collaborator trait
//! - [`NoiseHeightmap`] - a seeded noise implementation with a cached
//!   viewport window
//! - [`pregen`] - bulk pre-generation around a center region
//!
//! # Example
//!
//! ```no_run
//! use roadgen::{GenConfig, NoiseHeightmap, RoadMap};
//!
//! let map = RoadMap::new("saves/world", 42, GenConfig::default());
//! let terrain = NoiseHeightmap::new(42);
//!
//! // Lazily generates, caches, and persists the region at (0, 0).
//! let region = map.get_region(&terrain, 0, 0);
//! for network in region.networks() {
//!     println!("road origin: {}", network.origin_point());
//! }
//! ```
//!
//! Generation is fully deterministic: the same seed and terrain always
//! produce the same networks, on any thread count.

pub mod astar;
pub mod config;
pub mod generator;
pub mod graph;
pub mod height;
pub mod io;
pub mod map;
pub mod network;
pub mod point;
pub mod pregen;
pub mod region;
pub mod road;
pub mod smoothness;

pub use astar::{AStar, Destination};
pub use config::GenConfig;
pub use generator::RoadGenerator;
pub use graph::VertexGraph;
pub use height::{HeightSource, NoiseHeightmap};
pub use io::{StoreError, StoreResult};
pub use map::RoadMap;
pub use network::RoadNetwork;
pub use point::Point;
pub use region::RoadRegion;
pub use road::{Road, RoadVertex, VertexFlags};
pub use smoothness::SmoothnessGraph;
