//! The ligand-receptor result table.

use crate::common::*;
use std::io::Write;

/// One scored interaction between a source and a target group
#[derive(Debug, Clone, PartialEq)]
pub struct LrRow {
    pub sample: Option<Box<str>>,
    pub source: Box<str>,
    pub target: Box<str>,
    pub ligand_complex: Box<str>,
    pub receptor_complex: Box<str>,
    /// aligned with [`LrTable::columns`]
    pub values: Vec<f32>,
}

impl LrRow {
    /// `ligand -> receptor`
    pub fn interaction(&self) -> String {
        format!(
            "{}{}{}",
            self.ligand_complex, INTERACTION_SEP, self.receptor_complex
        )
    }

    fn key(&self) -> (&Option<Box<str>>, &str, &str, &str, &str) {
        (
            &self.sample,
            &self.source,
            &self.target,
            &self.ligand_complex,
            &self.receptor_complex,
        )
    }
}

/// Rows keyed by (sample,) source, target, ligand and receptor complex,
/// plus named numeric columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LrTable {
    columns: Vec<Box<str>>,
    rows: Vec<LrRow>,
    sample_key: Option<Box<str>>,
}

impl LrTable {
    pub fn new(columns: Vec<Box<str>>) -> Self {
        Self {
            columns,
            rows: vec![],
            sample_key: None,
        }
    }

    pub fn push(&mut self, row: LrRow) -> anyhow::Result<()> {
        if row.values.len() != self.columns.len() {
            anyhow::bail!(
                "row has {} values for {} columns",
                row.values.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[Box<str>] {
        &self.columns
    }

    pub fn rows(&self) -> &[LrRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// name of the sample column, when rows come from several samples
    pub fn sample_key(&self) -> Option<&str> {
        self.sample_key.as_deref()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.as_ref() == name)
    }

    pub fn column_index(&self, name: &str) -> anyhow::Result<usize> {
        self.columns
            .iter()
            .position(|c| c.as_ref() == name)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "column `{}` is not in the table; available: {}",
                    name,
                    self.columns.join(", ")
                )
            })
    }

    pub fn column(&self, name: &str) -> anyhow::Result<Vec<f32>> {
        let i = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r.values[i]).collect())
    }

    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&LrRow) -> bool,
    {
        self.rows.retain(f);
    }

    /// Apply `f` to every value of one column
    pub fn map_column<F>(&mut self, name: &str, f: F) -> anyhow::Result<()>
    where
        F: Fn(f32) -> f32,
    {
        let i = self.column_index(name)?;
        self.rows.iter_mut().for_each(|r| r.values[i] = f(r.values[i]));
        Ok(())
    }

    /// Lexical order of (sample, source, target, ligand, receptor)
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| a.key().cmp(&b.key()));
    }

    /// Stack per-sample tables, tagging every row with its sample. All
    /// tables must share the same columns.
    pub fn concat_samples(
        sample_key: &str,
        tables: Vec<(Box<str>, LrTable)>,
    ) -> anyhow::Result<Self> {
        let mut ret = LrTable {
            sample_key: Some(sample_key.into()),
            ..Default::default()
        };

        for (i, (sample, table)) in tables.into_iter().enumerate() {
            if i == 0 {
                ret.columns = table.columns;
            } else if ret.columns != table.columns {
                anyhow::bail!("sample `{}` has different columns", sample);
            }
            ret.rows.extend(table.rows.into_iter().map(|row| LrRow {
                sample: Some(sample.clone()),
                ..row
            }));
        }
        Ok(ret)
    }

    /// Tab-separated text with a header line
    pub fn write_tsv<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        let mut header: Vec<&str> = vec![];
        if let Some(key) = self.sample_key.as_deref() {
            header.push(key);
        }
        header.extend(["source", "target", "ligand_complex", "receptor_complex"]);
        header.extend(self.columns.iter().map(|c| c.as_ref()));
        writeln!(out, "{}", header.join("\t"))?;

        for row in self.rows.iter() {
            let mut words: Vec<String> = vec![];
            if self.sample_key.is_some() {
                words.push(row.sample.as_deref().unwrap_or("").to_string());
            }
            words.push(row.source.to_string());
            words.push(row.target.to_string());
            words.push(row.ligand_complex.to_string());
            words.push(row.receptor_complex.to_string());
            words.extend(row.values.iter().map(|v| v.to_string()));
            writeln!(out, "{}", words.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source: &str, target: &str, value: f32) -> LrRow {
        LrRow {
            sample: None,
            source: source.into(),
            target: target.into(),
            ligand_complex: "A".into(),
            receptor_complex: "B_C".into(),
            values: vec![value],
        }
    }

    #[test]
    fn rows_must_match_columns() {
        let mut table = LrTable::new(vec!["lr_means".into()]);
        assert!(table.push(row("T", "B", 1.0)).is_ok());
        let mut bad = row("T", "B", 1.0);
        bad.values.push(2.0);
        assert!(table.push(bad).is_err());
        assert_eq!(table.rows()[0].interaction(), "A -> B_C");
    }

    #[test]
    fn concatenated_samples_are_tagged() {
        let mut t1 = LrTable::new(vec!["lr_means".into()]);
        t1.push(row("T", "B", 1.0)).unwrap();
        let mut t2 = LrTable::new(vec!["lr_means".into()]);
        t2.push(row("B", "T", 2.0)).unwrap();
        t2.push(row("B", "B", 3.0)).unwrap();

        let combined =
            LrTable::concat_samples("sample", vec![("s1".into(), t1), ("s2".into(), t2)]).unwrap();
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.sample_key(), Some("sample"));
        assert_eq!(combined.rows()[2].sample.as_deref(), Some("s2"));

        let mut text = vec![];
        combined.write_tsv(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text
            .starts_with("sample\tsource\ttarget\tligand_complex\treceptor_complex\tlr_means"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn mismatched_columns_do_not_concatenate() {
        let t1 = LrTable::new(vec!["lr_means".into()]);
        let t2 = LrTable::new(vec!["expr_prod".into()]);
        let t3 = LrTable::new(vec!["lr_means".into()]);
        let mismatched = vec![("a".into(), t1.clone()), ("b".into(), t2)];
        assert!(LrTable::concat_samples("sample", mismatched).is_err());
        let matching = vec![("a".into(), t1), ("c".into(), t3)];
        assert!(LrTable::concat_samples("sample", matching).is_ok());
    }
}
