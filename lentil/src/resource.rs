//! Ligand-receptor resources and their resolution against a gene list.

use crate::common::*;

/// One ligand-receptor pair. Either side may be a complex whose
/// subunits are joined by [`COMPLEX_SEP`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LrPair {
    pub ligand: Box<str>,
    pub receptor: Box<str>,
}

impl LrPair {
    pub fn new(ligand: &str, receptor: &str) -> Self {
        Self {
            ligand: ligand.into(),
            receptor: receptor.into(),
        }
    }
}

/// subunit genes of a gene or complex name
pub fn subunits(name: &str) -> Vec<&str> {
    name.split(COMPLEX_SEP).filter(|x| !x.is_empty()).collect()
}

/// An ordered, duplicate-free list of ligand-receptor pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pairs: Vec<LrPair>,
}

impl Resource {
    /// Keeps the first occurrence of each pair
    pub fn new(pairs: Vec<LrPair>) -> Self {
        let mut seen = HashSet::default();
        let pairs = pairs
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        Self { pairs }
    }

    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, S)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(l, r)| LrPair::new(l.as_ref(), r.as_ref()))
                .collect(),
        )
    }

    pub fn pairs(&self) -> &[LrPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Drop pairs with any subunit missing from `genes`
    pub fn resolve(&self, genes: &[Box<str>]) -> Resource {
        let known: HashSet<&str> = genes.iter().map(|g| g.as_ref()).collect();
        let is_known = |name: &str| {
            let units = subunits(name);
            !units.is_empty() && units.iter().all(|u| known.contains(u))
        };

        let pairs: Vec<LrPair> = self
            .pairs
            .iter()
            .filter(|p| is_known(&p.ligand) && is_known(&p.receptor))
            .cloned()
            .collect();

        let ndropped = self.pairs.len() - pairs.len();
        if ndropped > 0 {
            info!(
                "{} of {} ligand-receptor pairs were not resolved against the data",
                ndropped,
                self.pairs.len()
            );
        }
        Resource { pairs }
    }
}

/// Anything that can hand out a resource by name
pub trait ResourceProvider {
    fn load(&self, name: &str) -> anyhow::Result<Resource>;
}

/// In-memory named resources
#[derive(Debug, Default, Clone)]
pub struct ResourceCatalog {
    resources: HashMap<Box<str>, Resource>,
}

impl ResourceCatalog {
    pub fn insert(&mut self, name: &str, resource: Resource) {
        self.resources.insert(name.to_lowercase().into(), resource);
    }
}

impl ResourceProvider for ResourceCatalog {
    fn load(&self, name: &str) -> anyhow::Result<Resource> {
        self.resources
            .get(name.to_lowercase().as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("resource `{}` is not available", name))
    }
}

/// A caller-supplied resource overrides the named lookup
pub fn select_resource(
    provider: &dyn ResourceProvider,
    resource_name: &str,
    resource: Option<Resource>,
) -> anyhow::Result<Resource> {
    match resource {
        Some(resource) => Ok(resource),
        None => provider.load(resource_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_removed() {
        let res = Resource::from_pairs(&[("A", "B"), ("C", "D1_D2"), ("A", "B")]);
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn complexes_need_every_subunit() {
        let genes: Vec<Box<str>> = ["A", "B", "C", "D1"].iter().map(|&x| x.into()).collect();
        let res = Resource::from_pairs(&[("A", "B"), ("C", "D1_D2"), ("C", "D1")]);
        let resolved = res.resolve(&genes);
        assert_eq!(
            resolved.pairs(),
            &[LrPair::new("A", "B"), LrPair::new("C", "D1")]
        );
    }

    #[test]
    fn custom_resource_wins() {
        let mut catalog = ResourceCatalog::default();
        catalog.insert("consensus", Resource::from_pairs(&[("A", "B")]));
        let custom = Resource::from_pairs(&[("C", "D")]);
        let chosen = select_resource(&catalog, "consensus", Some(custom.clone())).unwrap();
        assert_eq!(chosen, custom);
        assert!(select_resource(&catalog, "cellchatdb", None).is_err());
        assert_eq!(
            select_resource(&catalog, "Consensus", None).unwrap().len(),
            1
        );
    }
}
