//! Odin Core
//!
//! Resource graph, template model and change planning for the Odin
//! deployment topology. Topology builders produce a [`template::Template`];
//! providers hand it to the control plane.

pub mod differ;
pub mod effect;
pub mod graph;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod template;
