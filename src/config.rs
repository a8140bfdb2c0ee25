//! Generation settings consumed read-only during a pass.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::road::Road;

/// Tuning knobs for road generation.
///
/// A config is read-only for the duration of a generation pass. Changing
/// terrain-affecting settings between passes requires clearing persisted
/// data with [`crate::io::delete_all`], since stored regions would no
/// longer match the terrain they were traced over.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GenConfig {
    /// Minimum length of a main road, in blocks.
    pub min_road_length: i32,
    /// Maximum length of a main road, in blocks.
    pub max_road_length: i32,
    /// Heights below this are penalized quadratically (beach avoidance).
    pub shoreline_cutoff: f32,
    /// Heights above this are penalized quadratically (mountain avoidance).
    pub mountain_cutoff: f32,
    /// Maximum number of branch roads attempted per network.
    pub max_branches: u32,
    /// Chance per chunk that a road network originates there.
    pub road_chance: f32,
    /// Radius of the pre-generation pattern, in regions.
    pub pregen_radius: i32,
    /// Skew factor controlling how far the pre-generation pattern bulges
    /// along the axes. Higher values approach a full square.
    pub pregen_skew: f32,
    /// Worker threads for pre-generation. Values below 2 run inline on the
    /// calling thread.
    pub pregen_thread_count: usize,
    /// Whether generated regions and networks are persisted to disk.
    pub persist_roads: bool,
    /// Whether networks are written into every region their bounds overlap,
    /// not only the region that triggered generation.
    pub generate_partial: bool,
    /// Log an ASCII rendering of the pre-generation pattern when it runs.
    pub debug_pregen_shape: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            min_road_length: Road::MAX_DISTANCE / 4,
            max_road_length: Road::MAX_DISTANCE,
            shoreline_cutoff: 20.0,
            mountain_cutoff: 40.0,
            max_branches: 15,
            road_chance: 1.0 / 4000.0,
            pregen_radius: 15,
            pregen_skew: 0.25,
            pregen_thread_count: 4,
            persist_roads: true,
            generate_partial: true,
            debug_pregen_shape: false,
        }
    }
}
