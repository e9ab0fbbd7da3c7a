//! Scoring functions, one per method.

pub mod cellchat;
pub mod cellphonedb;
pub mod connectome;
pub mod geometric_mean;
pub mod logfc;
pub mod natmi;
pub mod sca;

use crate::common::*;
use crate::stats::{GroupStats, StatSet};

/// One (source, target, ligand, receptor) combination; groups index
/// the grouping, ligand and receptor index the entity matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub source: usize,
    pub target: usize,
    pub ligand: usize,
    pub receptor: usize,
}

impl Candidate {
    /// ligand statistic in the source group
    pub fn ligand_of(&self, stat: &Mat) -> f32 {
        stat[(self.ligand, self.source)]
    }

    /// receptor statistic in the target group
    pub fn receptor_of(&self, stat: &Mat) -> f32 {
        stat[(self.receptor, self.target)]
    }
}

/// What a scoring function sees
pub struct ScoreInput<'a> {
    pub stats: &'a GroupStats,
    pub candidates: &'a [Candidate],
    /// mean of the whole expression matrix in scope
    pub mat_mean: f32,
}

/// Per-candidate outputs of a scoring function
#[derive(Debug, Clone, Default)]
pub struct MethodScores {
    pub magnitude: Option<Vec<f32>>,
    pub specificity: Option<Vec<f32>>,
    /// method-specific extra columns
    pub extra: Vec<(Box<str>, Vec<f32>)>,
}

pub trait ScoringFn: Send + Sync {
    /// optional entity statistics the method reads
    fn required_stats(&self) -> StatSet {
        StatSet::default()
    }

    /// magnitude and specificity of every candidate; a permutation-based
    /// score is left out here
    fn score(&self, input: &ScoreInput) -> MethodScores;

    /// statistic compared against shuffled labels
    fn permutation_statistic(
        &self,
        _stats: &GroupStats,
        _candidates: &[Candidate],
    ) -> Option<Vec<f32>> {
        None
    }
}

/// Built-in methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    CellPhoneDb,
    Connectome,
    LogFc,
    Natmi,
    SingleCellSignalR,
    GeometricMean,
    CellChat,
}

impl MethodKind {
    pub fn scoring_fn(&self) -> &'static dyn ScoringFn {
        match self {
            MethodKind::CellPhoneDb => &cellphonedb::CellPhoneDb,
            MethodKind::Connectome => &connectome::Connectome,
            MethodKind::LogFc => &logfc::LogFc,
            MethodKind::Natmi => &natmi::Natmi,
            MethodKind::SingleCellSignalR => &sca::SingleCellSignalR,
            MethodKind::GeometricMean => &geometric_mean::GeometricMean,
            MethodKind::CellChat => &cellchat::CellChat,
        }
    }

    /// short identifier, e.g., for the command line
    pub fn key(&self) -> &'static str {
        match self {
            MethodKind::CellPhoneDb => "cellphonedb",
            MethodKind::Connectome => "connectome",
            MethodKind::LogFc => "logfc",
            MethodKind::Natmi => "natmi",
            MethodKind::SingleCellSignalR => "singlecellsignalr",
            MethodKind::GeometricMean => "geometric_mean",
            MethodKind::CellChat => "cellchat",
        }
    }
}

/// `f(ligand in source, receptor in target)` for every candidate
pub(crate) fn pairwise<F>(stat: &Mat, candidates: &[Candidate], f: F) -> Vec<f32>
where
    F: Fn(f32, f32) -> f32,
{
    candidates
        .iter()
        .map(|c| f(c.ligand_of(stat), c.receptor_of(stat)))
        .collect()
}
