use crate::common::*;
use rand::seq::SliceRandom;
use rand::Rng;
use std::hash::Hash;

/// partition membership vector into groups of indexes
/// # Arguments
/// * `membership` - a vector of membership (E.g., cell type assignment)
/// # Returns
/// A hashmap: group name -> indexes of the elements (in input order)
pub fn partition_by_membership<T>(membership: &[T]) -> HashMap<T, Vec<usize>>
where
    T: Eq + Hash + Clone,
{
    let mut pb_elems: HashMap<T, Vec<usize>> = HashMap::default();
    for (cell, k) in membership.iter().enumerate() {
        pb_elems.entry(k.clone()).or_default().push(cell);
    }
    pb_elems
}

/// Cells assigned to named groups. Only groups with enough cells are
/// kept; cells of dropped groups are out of scope altogether.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    names: Vec<Box<str>>,
    labels: Vec<usize>,
    cells: Vec<usize>,
}

impl Grouping {
    /// Build from categorical levels and per-cell codes
    ///
    /// * `levels`: group names in category order
    /// * `codes`: group index of each cell
    /// * `min_cells`: groups with fewer cells are dropped
    pub fn from_categories(levels: &[Box<str>], codes: &[usize], min_cells: usize) -> Self {
        let members = partition_by_membership(codes);

        let kept: Vec<usize> = (0..levels.len())
            .filter(|k| members.get(k).map(|m| m.len()).unwrap_or(0) >= min_cells.max(1))
            .collect();

        let dropped: Vec<&str> = (0..levels.len())
            .filter(|k| !kept.contains(k))
            .map(|k| levels[k].as_ref())
            .collect();

        if !dropped.is_empty() {
            info!(
                "excluding {} group(s) with fewer than {} cells: {:?}",
                dropped.len(),
                min_cells,
                dropped
            );
        }

        let new_index: HashMap<usize, usize> =
            kept.iter().enumerate().map(|(i, &k)| (k, i)).collect();

        let mut cells = vec![];
        let mut labels = vec![];
        for (j, k) in codes.iter().enumerate() {
            if let Some(&i) = new_index.get(k) {
                cells.push(j);
                labels.push(i);
            }
        }

        Self {
            names: kept.iter().map(|&k| levels[k].clone()).collect(),
            labels,
            cells,
        }
    }

    pub fn names(&self) -> &[Box<str>] {
        &self.names
    }

    pub fn num_groups(&self) -> usize {
        self.names.len()
    }

    /// group index of every retained cell
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// positions of the retained cells in the original data
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.num_groups()];
        self.labels.iter().for_each(|&k| sizes[k] += 1);
        sizes
    }

    /// Labels shuffled across the same cells; group sizes are preserved
    pub fn shuffled_labels<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let mut labels = self.labels.clone();
        labels.shuffle(rng);
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn levels() -> Vec<Box<str>> {
        vec!["B".into(), "NK".into(), "T".into()]
    }

    #[test]
    fn small_groups_leave_scope() {
        let codes = [0, 0, 0, 1, 2, 2, 2, 0];
        let grouping = Grouping::from_categories(&levels(), &codes, 3);
        let expected: Vec<Box<str>> = vec!["B".into(), "T".into()];
        assert_eq!(grouping.names(), expected.as_slice());
        assert_eq!(grouping.cells(), &[0, 1, 2, 4, 5, 6, 7]);
        assert_eq!(grouping.labels(), &[0, 0, 0, 1, 1, 1, 0]);
        assert_eq!(grouping.sizes(), vec![4, 3]);
    }

    #[test]
    fn shuffling_keeps_group_sizes() {
        let codes = [0, 1, 2, 0, 1, 2, 0, 1, 2, 2];
        let grouping = Grouping::from_categories(&levels(), &codes, 1);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1337);
        let shuffled = grouping.shuffled_labels(&mut rng);
        let mut sizes = vec![0; 3];
        shuffled.iter().for_each(|&k| sizes[k] += 1);
        assert_eq!(sizes, grouping.sizes());
    }
}
