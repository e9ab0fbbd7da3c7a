#![allow(dead_code)]

pub use log::{debug, info, warn};

pub use fnv::FnvHashMap as HashMap;
pub use fnv::FnvHashSet as HashSet;

pub use rayon::prelude::*;

pub type Mat = nalgebra::DMatrix<f32>;

/// separator between subunits of a protein complex, e.g., `ITGA4_ITGB1`
pub const COMPLEX_SEP: char = '_';

/// separator used to display an interaction, `ligand -> receptor`
pub const INTERACTION_SEP: &str = " -> ";
