//! In-memory expression data: a `gene x cell` matrix with alternative
//! stores (raw counts, named layers) and per-cell annotations.

use crate::common::*;

/// A per-cell annotation column.
#[derive(Debug, Clone, PartialEq)]
pub enum ObsColumn {
    /// categorical with explicit level order; `codes[j]` indexes `levels`
    Categorical {
        levels: Vec<Box<str>>,
        codes: Vec<usize>,
    },
    /// free text, coerced to categorical on demand
    Text(Vec<Box<str>>),
}

impl ObsColumn {
    /// Text column from string values
    pub fn text<S: AsRef<str>>(values: &[S]) -> Self {
        ObsColumn::Text(values.iter().map(|x| x.as_ref().into()).collect())
    }

    /// Categorical column with a given level order. Every value must
    /// appear among the levels.
    pub fn categorical<S: AsRef<str>, L: AsRef<str>>(
        values: &[S],
        levels: &[L],
    ) -> anyhow::Result<Self> {
        let levels: Vec<Box<str>> = levels.iter().map(|x| x.as_ref().into()).collect();
        let level_pos: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(k, x)| (x.as_ref(), k))
            .collect();

        let codes = values
            .iter()
            .map(|v| {
                level_pos.get(v.as_ref()).copied().ok_or_else(|| {
                    anyhow::anyhow!("value `{}` is not one of the declared levels", v.as_ref())
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ObsColumn::Categorical { levels, codes })
    }

    pub fn len(&self) -> usize {
        match self {
            ObsColumn::Categorical { codes, .. } => codes.len(),
            ObsColumn::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, ObsColumn::Categorical { .. })
    }

    /// Levels and codes; text gets lexically sorted levels
    fn levels_and_codes(&self) -> (Vec<Box<str>>, Vec<usize>) {
        match self {
            ObsColumn::Categorical { levels, codes } => (levels.clone(), codes.clone()),
            ObsColumn::Text(values) => {
                let mut levels = values.clone();
                levels.sort();
                levels.dedup();
                let level_pos: HashMap<&str, usize> = levels
                    .iter()
                    .enumerate()
                    .map(|(k, x)| (x.as_ref(), k))
                    .collect();
                let codes = values.iter().map(|v| level_pos[v.as_ref()]).collect();
                (levels, codes)
            }
        }
    }

    /// Keep the selected cells; categorical levels stay declared even
    /// when no retained cell uses them.
    fn subset(&self, cells: &[usize]) -> ObsColumn {
        match self {
            ObsColumn::Categorical { levels, codes } => ObsColumn::Categorical {
                levels: levels.clone(),
                codes: cells.iter().map(|&j| codes[j]).collect(),
            },
            ObsColumn::Text(values) => {
                ObsColumn::Text(cells.iter().map(|&j| values[j].clone()).collect())
            }
        }
    }
}

/// Which numeric store of [`ExprData`] feeds the scoring
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MatrixSource {
    /// the default matrix
    #[default]
    X,
    /// the raw store, which may carry its own gene list
    Raw,
    /// a named layer sharing the default gene list
    Layer(Box<str>),
}

#[derive(Debug, Clone)]
pub struct RawStore {
    pub gene_names: Vec<Box<str>>,
    pub mat: Mat,
}

/// Expression data with genes in rows and cells in columns
#[derive(Debug, Clone)]
pub struct ExprData {
    gene_names: Vec<Box<str>>,
    cell_names: Vec<Box<str>>,
    x: Mat,
    raw: Option<RawStore>,
    layers: HashMap<Box<str>, Mat>,
    obs: Vec<(Box<str>, ObsColumn)>,
}

impl ExprData {
    /// * `x`: `gene x cell` matrix
    /// * `gene_names`: one name per row
    /// * `cell_names`: one name per column
    pub fn new(
        x: Mat,
        gene_names: Vec<Box<str>>,
        cell_names: Vec<Box<str>>,
    ) -> anyhow::Result<Self> {
        if x.nrows() != gene_names.len() {
            anyhow::bail!(
                "{} rows in the matrix, but {} gene names",
                x.nrows(),
                gene_names.len()
            );
        }
        if x.ncols() != cell_names.len() {
            anyhow::bail!(
                "{} columns in the matrix, but {} cell names",
                x.ncols(),
                cell_names.len()
            );
        }
        Ok(Self {
            gene_names,
            cell_names,
            x,
            raw: None,
            layers: HashMap::default(),
            obs: vec![],
        })
    }

    pub fn with_raw(mut self, mat: Mat, gene_names: Vec<Box<str>>) -> anyhow::Result<Self> {
        if mat.ncols() != self.num_cells() || mat.nrows() != gene_names.len() {
            anyhow::bail!(
                "raw store must be {} genes x {} cells",
                gene_names.len(),
                self.num_cells()
            );
        }
        self.raw = Some(RawStore { gene_names, mat });
        Ok(self)
    }

    pub fn with_layer(mut self, name: &str, mat: Mat) -> anyhow::Result<Self> {
        if mat.shape() != self.x.shape() {
            anyhow::bail!("layer `{}` must have the same shape as X", name);
        }
        self.layers.insert(name.into(), mat);
        Ok(self)
    }

    /// Add or replace an annotation column
    pub fn set_obs(&mut self, key: &str, column: ObsColumn) -> anyhow::Result<()> {
        if column.len() != self.num_cells() {
            anyhow::bail!(
                "annotation `{}` has {} values for {} cells",
                key,
                column.len(),
                self.num_cells()
            );
        }
        if let Some(slot) = self.obs.iter_mut().find(|(k, _)| k.as_ref() == key) {
            slot.1 = column;
        } else {
            self.obs.push((key.into(), column));
        }
        Ok(())
    }

    pub fn num_cells(&self) -> usize {
        self.cell_names.len()
    }

    pub fn gene_names(&self) -> &[Box<str>] {
        &self.gene_names
    }

    pub fn obs(&self, key: &str) -> Option<&ObsColumn> {
        self.obs
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, col)| col)
    }

    pub fn require_obs(&self, key: &str) -> anyhow::Result<&ObsColumn> {
        self.obs(key)
            .ok_or_else(|| anyhow::anyhow!("`{}` was not found in the cell annotations", key))
    }

    /// Coerce an annotation column to categorical in place
    pub fn ensure_categorical(&mut self, key: &str) -> anyhow::Result<()> {
        let column = self.require_obs(key)?;
        if !column.is_categorical() {
            warn!("`{}` was assigned as a categorical", key);
            let (levels, codes) = column.levels_and_codes();
            self.set_obs(key, ObsColumn::Categorical { levels, codes })?;
        }
        Ok(())
    }

    /// Levels and codes of an annotation; a text column is coerced on
    /// the fly and the data is left untouched
    pub fn categories_coerced(&self, key: &str) -> anyhow::Result<(Vec<Box<str>>, Vec<usize>)> {
        let column = self.require_obs(key)?;
        if !column.is_categorical() {
            warn!("`{}` was assigned as a categorical", key);
        }
        Ok(column.levels_and_codes())
    }

    /// Levels and per-cell codes of a categorical annotation
    pub fn categories(&self, key: &str) -> anyhow::Result<(&[Box<str>], &[usize])> {
        match self.require_obs(key)? {
            ObsColumn::Categorical { levels, codes } => Ok((levels, codes)),
            ObsColumn::Text(_) => anyhow::bail!("`{}` is not categorical", key),
        }
    }

    /// Gene names and matrix of the selected store
    pub fn matrix(&self, source: &MatrixSource) -> anyhow::Result<(&[Box<str>], &Mat)> {
        match source {
            MatrixSource::X => Ok((&self.gene_names, &self.x)),
            MatrixSource::Raw => {
                let raw = self
                    .raw
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("the raw store is not initialized"))?;
                Ok((&raw.gene_names, &raw.mat))
            }
            MatrixSource::Layer(name) => {
                let mat = self
                    .layers
                    .get(name)
                    .ok_or_else(|| anyhow::anyhow!("layer `{}` was not found", name))?;
                Ok((&self.gene_names, mat))
            }
        }
    }

    /// A copy restricted to the given cells (in the given order)
    pub fn subset_cells(&self, cells: &[usize]) -> ExprData {
        ExprData {
            gene_names: self.gene_names.clone(),
            cell_names: cells.iter().map(|&j| self.cell_names[j].clone()).collect(),
            x: self.x.select_columns(cells.iter()),
            raw: self.raw.as_ref().map(|raw| RawStore {
                gene_names: raw.gene_names.clone(),
                mat: raw.mat.select_columns(cells.iter()),
            }),
            layers: self
                .layers
                .iter()
                .map(|(k, m)| (k.clone(), m.select_columns(cells.iter())))
                .collect(),
            obs: self
                .obs
                .iter()
                .map(|(k, col)| (k.clone(), col.subset(cells)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> ExprData {
        let x = Mat::from_row_slice(2, 4, &[0., 1., 2., 3., 4., 5., 6., 7.]);
        let genes = vec!["g1".into(), "g2".into()];
        let cells = (0..4).map(|j| format!("c{}", j).into()).collect();
        let mut data = ExprData::new(x, genes, cells).unwrap();
        data.set_obs("sample", ObsColumn::text(&["s2", "s1", "s2", "s1"]))
            .unwrap();
        data
    }

    #[test]
    fn text_is_coerced_with_sorted_levels() {
        let mut data = toy();
        assert!(data.categories("sample").is_err());
        data.ensure_categorical("sample").unwrap();
        let (levels, codes) = data.categories("sample").unwrap();
        let expected: Vec<Box<str>> = vec!["s1".into(), "s2".into()];
        assert_eq!(levels, expected.as_slice());
        assert_eq!(codes, &[1, 0, 1, 0]);
    }

    #[test]
    fn missing_key_is_reported() {
        let mut data = toy();
        let err = data.ensure_categorical("batch").unwrap_err();
        assert!(err.to_string().contains("batch"));
    }

    #[test]
    fn subset_keeps_levels_and_columns() {
        let mut data = toy();
        data.ensure_categorical("sample").unwrap();
        let sub = data.subset_cells(&[1, 3]);
        assert_eq!(sub.num_cells(), 2);
        let (_, x) = sub.matrix(&MatrixSource::X).unwrap();
        assert_eq!(x[(1, 0)], 5.);
        assert_eq!(x[(1, 1)], 7.);
        let (levels, codes) = sub.categories("sample").unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(codes, &[0, 0]);
    }

    #[test]
    fn absent_stores_are_configuration_errors() {
        let data = toy();
        assert!(data.matrix(&MatrixSource::Raw).is_err());
        assert!(data.matrix(&MatrixSource::Layer("counts".into())).is_err());
    }
}
