//! Method descriptors and the registry that owns them.

use crate::methods::{MethodKind, ScoringFn};
use crate::permutation::Alternative;

use std::fmt;

/// A score column and how to rank it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreColumn {
    pub name: Box<str>,
    /// smaller is better (e.g., p-values)
    pub ascending: bool,
}

impl ScoreColumn {
    pub fn new(name: &str, ascending: bool) -> Self {
        Self {
            name: name.into(),
            ascending,
        }
    }
}

/// Immutable description of a scoring method
#[derive(Debug, Clone)]
pub struct MethodMeta {
    pub method_name: Box<str>,
    pub kind: MethodKind,
    /// statistics aggregated over complex subunits
    pub complex_cols: Vec<Box<str>>,
    /// additional columns reported by the method
    pub add_cols: Vec<Box<str>>,
    pub magnitude: Option<ScoreColumn>,
    pub specificity: Option<ScoreColumn>,
    /// specificity comes from a label-permutation test
    pub permute: bool,
    /// tail of the permutation null counted as extreme
    pub alternative: Alternative,
    /// publication in Harvard style
    pub reference: Box<str>,
}

/// One row of the method table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub method_name: Box<str>,
    pub magnitude: Option<Box<str>>,
    pub specificity: Option<Box<str>>,
    pub reference: Box<str>,
}

impl MethodMeta {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method_name: &str,
        kind: MethodKind,
        complex_cols: &[&str],
        add_cols: &[&str],
        magnitude: Option<ScoreColumn>,
        specificity: Option<ScoreColumn>,
        permute: bool,
        reference: &str,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            kind,
            complex_cols: complex_cols.iter().map(|&x| x.into()).collect(),
            add_cols: add_cols.iter().map(|&x| x.into()).collect(),
            magnitude,
            specificity,
            permute,
            alternative: Alternative::Greater,
            reference: reference.into(),
        }
    }

    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.alternative = alternative;
        self
    }

    pub fn fun(&self) -> &'static dyn ScoringFn {
        self.kind.scoring_fn()
    }

    pub fn describe(&self) -> String {
        let show = |x: &Option<ScoreColumn>| match x {
            Some(col) => col.name.to_string(),
            None => "None".to_string(),
        };
        format!(
            "{} uses `{}` and `{}` as measures of expression strength \
             and interaction specificity, respectively",
            self.method_name,
            show(&self.magnitude),
            show(&self.specificity)
        )
    }

    pub fn get_meta(&self) -> MethodInfo {
        MethodInfo {
            method_name: self.method_name.clone(),
            magnitude: self.magnitude.as_ref().map(|x| x.name.clone()),
            specificity: self.specificity.as_ref().map(|x| x.name.clone()),
            reference: self.reference.clone(),
        }
    }

    /// magnitude and specificity, in that order, when present
    pub fn score_columns(&self) -> Vec<&ScoreColumn> {
        self.magnitude.iter().chain(self.specificity.iter()).collect()
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

const DIMITROV_2022: &str = "Dimitrov, D., Türei, D., Garrido-Rodriguez, M., Burmedi, P.L., Nagai, J.S., Boys, C., Ramirez Flores, R.O., Kim, H., Szalai, B., Costa, I.G. and Valdeolivas, A., 2022. Comparison of methods and resources for cell-cell communication inference from single-cell RNA-Seq data. Nature Communications, 13(1), pp.1-13.";

/// Ordered method descriptors, built once and passed around
#[derive(Debug, Clone)]
pub struct MethodRegistry {
    methods: Vec<MethodMeta>,
}

impl MethodRegistry {
    pub fn new(methods: Vec<MethodMeta>) -> Self {
        Self { methods }
    }

    /// All built-in methods
    pub fn builtin() -> Self {
        let means = ["ligand_means", "receptor_means"];
        Self::new(vec![
            MethodMeta::new(
                "CellPhoneDB",
                MethodKind::CellPhoneDb,
                &means,
                &[],
                Some(ScoreColumn::new("lr_means", false)),
                Some(ScoreColumn::new("cellphone_pvals", true)),
                true,
                "Efremova, M., Vento-Tormo, M., Teichmann, S.A. and Vento-Tormo, R., 2020. CellPhoneDB: inferring cell–cell communication from combined expression of multi-subunit ligand–receptor complexes. Nature protocols, 15(4), pp.1484-1506.",
            ),
            MethodMeta::new(
                "Connectome",
                MethodKind::Connectome,
                &means,
                &["ligand_zscores", "receptor_zscores"],
                Some(ScoreColumn::new("expr_prod", false)),
                Some(ScoreColumn::new("scaled_weight", false)),
                false,
                "Raredon, M.S.B., Yang, J., Garritano, J., Wang, M., Kushnir, D., Schupp, J.C., Adams, T.S., Greaney, A.M., Leiby, K.L., Kaminski, N. and Kluger, Y., 2022. Computation and visualization of cell–cell signaling topologies in single-cell systems data using Connectome. Scientific Reports, 12(1), pp.1-12.",
            ),
            MethodMeta::new(
                "log2FC",
                MethodKind::LogFc,
                &means,
                &["ligand_logfc", "receptor_logfc"],
                None,
                Some(ScoreColumn::new("lr_logfc", false)),
                false,
                DIMITROV_2022,
            ),
            MethodMeta::new(
                "NATMI",
                MethodKind::Natmi,
                &means,
                &["ligand_means_sums", "receptor_means_sums"],
                Some(ScoreColumn::new("expr_prod", false)),
                Some(ScoreColumn::new("spec_weight", false)),
                false,
                "Hou, R., Denisenko, E., Ong, H.T., Ramilowski, J.A. and Forrest, A.R., 2020. Predicting cell-to-cell communication networks using NATMI. Nature communications, 11(1), pp.1-11.",
            ),
            MethodMeta::new(
                "SingleCellSignalR",
                MethodKind::SingleCellSignalR,
                &means,
                &["mat_mean"],
                Some(ScoreColumn::new("lrscore", false)),
                None,
                false,
                "Cabello-Aguilar, S., Alame, M., Kon-Sun-Tack, F., Fau, C., Lacroix, M. and Colinge, J., 2020. SingleCellSignalR: inference of intercellular networks from single-cell transcriptomics. Nucleic Acids Research, 48(10), pp.e55-e55.",
            ),
            MethodMeta::new(
                "Geometric Mean",
                MethodKind::GeometricMean,
                &means,
                &[],
                Some(ScoreColumn::new("lr_gmeans", false)),
                Some(ScoreColumn::new("gmean_pvals", true)),
                true,
                DIMITROV_2022,
            ),
            MethodMeta::new(
                "CellChat",
                MethodKind::CellChat,
                &means,
                &["ligand_trimean", "receptor_trimean"],
                Some(ScoreColumn::new("lr_probs", false)),
                Some(ScoreColumn::new("cellchat_pvals", true)),
                true,
                "Jin, S., Guerrero-Juarez, C.F., Zhang, L., Chang, I., Ramos, R., Kuan, C.H., Myung, P., Plikus, M.V. and Nie, Q., 2021. Inference and analysis of cell-cell communication using CellChat. Nature communications, 12(1), pp.1-20.",
            ),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodMeta> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Find a method by its name or key, ignoring case and punctuation
    pub fn get(&self, name: &str) -> anyhow::Result<&MethodMeta> {
        let query = normalize_name(name);
        self.methods
            .iter()
            .find(|m| {
                normalize_name(&m.method_name) == query || normalize_name(m.kind.key()) == query
            })
            .ok_or_else(|| {
                let known: Vec<&str> = self.methods.iter().map(|m| m.kind.key()).collect();
                anyhow::anyhow!("unknown method `{}`; available: {}", name, known.join(", "))
            })
    }

    pub fn show_methods(&self) -> MethodTable {
        MethodTable(self.methods.iter().map(|m| m.get_meta()).collect())
    }
}

/// The registry as a table, one row per method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTable(pub Vec<MethodInfo>);

impl fmt::Display for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Method Name\tMagnitude Score\tSpecificity Score\tReference")?;
        for row in self.0.iter() {
            writeln!(
                f,
                "{}\t{}\t{}\t{}",
                row.method_name,
                row.magnitude.as_deref().unwrap_or("None"),
                row.specificity.as_deref().unwrap_or("None"),
                row.reference
            )?;
        }
        Ok(())
    }
}
