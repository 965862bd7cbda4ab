use std::collections::HashMap;

use crate::models::AssociationMatrix;
use crate::services::dataset::Column;

/// Pairwise Pearson matrix over numeric columns; `None` when fewer than two are given.
pub fn correlation_matrix(columns: &[&Column]) -> Option<AssociationMatrix> {
    if columns.len() < 2 {
        return None;
    }
    let series: Vec<&[Option<f64>]> = columns.iter().filter_map(|c| c.as_numeric()).collect();
    let names = columns.iter().map(|c| c.name.clone()).collect();
    Some(AssociationMatrix::build(names, |i, j| pearson(series[i], series[j])))
}

/// Pairwise Cramér's V matrix over categorical columns; `None` when fewer than two are given.
pub fn cramers_v_matrix(columns: &[&Column]) -> Option<AssociationMatrix> {
    if columns.len() < 2 {
        return None;
    }
    let series: Vec<&[Option<String>]> = columns.iter().filter_map(|c| c.as_categorical()).collect();
    let names = columns.iter().map(|c| c.name.clone()).collect();
    Some(AssociationMatrix::build(names, |i, j| {
        cramers_v(&ContingencyTable::from_pairs(series[i], series[j]))
    }))
}

/// Pearson correlation over rows where both values are present.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Observed joint frequencies of two categorical columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ContingencyTable {
    counts: Vec<Vec<f64>>,
}

impl ContingencyTable {
    /// Cross-tabulates rows where both sides are present.
    pub fn from_pairs(rows: &[Option<String>], cols: &[Option<String>]) -> Self {
        let mut row_index: HashMap<&str, usize> = HashMap::new();
        let mut col_index: HashMap<&str, usize> = HashMap::new();
        let mut cells: Vec<(usize, usize)> = Vec::new();

        for (r, c) in rows.iter().zip(cols) {
            let (Some(r), Some(c)) = (r, c) else { continue };
            let next_row = row_index.len();
            let ri = *row_index.entry(r.as_str()).or_insert(next_row);
            let next_col = col_index.len();
            let ci = *col_index.entry(c.as_str()).or_insert(next_col);
            cells.push((ri, ci));
        }

        let mut counts = vec![vec![0.0; col_index.len()]; row_index.len()];
        for (ri, ci) in cells {
            counts[ri][ci] += 1.0;
        }
        Self { counts }
    }

    pub fn from_counts(counts: Vec<Vec<f64>>) -> Self {
        Self { counts }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.counts.len(), self.counts.first().map_or(0, Vec::len))
    }

    pub fn is_empty(&self) -> bool {
        let (r, k) = self.shape();
        r == 0 || k == 0
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().flatten().sum()
    }

    /// Chi-square statistic. Cells whose expected frequency is zero are left out of the sum.
    pub fn chi_square(&self) -> f64 {
        let row_sums: Vec<f64> = self.counts.iter().map(|row| row.iter().sum()).collect();
        let (_, k) = self.shape();
        let col_sums: Vec<f64> = (0..k)
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect();
        let total = self.total().max(1.0);

        let mut chi2 = 0.0;
        for (i, row) in self.counts.iter().enumerate() {
            for (j, observed) in row.iter().enumerate() {
                let expected = row_sums[i] * col_sums[j] / total;
                if expected > 0.0 {
                    chi2 += (observed - expected).powi(2) / expected;
                }
            }
        }
        chi2
    }
}

/// Bias-uncorrected Cramér's V, `None` for an empty table.
pub fn cramers_v(table: &ContingencyTable) -> Option<f64> {
    if table.is_empty() {
        return None;
    }
    let (r, k) = table.shape();
    let total = table.total();
    let n = if total > 0.0 { total } else { 1.0 };
    let denom = (r.min(k).saturating_sub(1)).max(1) as f64;
    let phi2 = table.chi_square() / n;
    Some((phi2 / denom).max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn identical_columns_are_fully_associated() {
        let a = cats(&["x", "y", "z", "x", "y", "z"]);
        let v = cramers_v(&ContingencyTable::from_pairs(&a, &a)).unwrap();
        assert!((v - 1.0).abs() < 1e-12);
    }

    #[test]
    fn independent_columns_are_near_zero() {
        // every combination appears equally often
        let mut a = Vec::new();
        let mut b = Vec::new();
        for _ in 0..25 {
            for left in ["p", "q"] {
                for right in ["u", "v", "w"] {
                    a.push(left);
                    b.push(right);
                }
            }
        }
        let v = cramers_v(&ContingencyTable::from_pairs(&cats(&a), &cats(&b))).unwrap();
        assert!(v.abs() < 1e-9, "expected ~0, got {}", v);
    }

    #[test]
    fn empty_table_is_undefined() {
        let a = vec![None, Some("x".to_string())];
        let b = vec![Some("y".to_string()), None];
        let table = ContingencyTable::from_pairs(&a, &b);
        assert!(table.is_empty());
        assert_eq!(cramers_v(&table), None);
    }

    #[test]
    fn zero_expected_cells_are_skipped() {
        // a zero row makes every expected frequency in it zero
        let table = ContingencyTable::from_counts(vec![
            vec![10.0, 0.0],
            vec![0.0, 0.0],
            vec![0.0, 10.0],
        ]);
        let chi2 = table.chi_square();
        assert!(chi2.is_finite());
        assert!((chi2 - 20.0).abs() < 1e-9);
        let v = cramers_v(&table).unwrap();
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_category_pair_does_not_divide_by_zero() {
        let a = cats(&["only", "only", "only"]);
        let b = cats(&["one", "two", "one"]);
        let v = cramers_v(&ContingencyTable::from_pairs(&a, &b)).unwrap();
        assert_eq!(v, 0.0);
    }

    #[test]
    fn pearson_handles_sign_and_degeneracy() {
        let x: Vec<Option<f64>> = vec![Some(1.0), Some(2.0), Some(3.0), None];
        let up: Vec<Option<f64>> = vec![Some(2.0), Some(4.0), Some(6.0), Some(100.0)];
        let down: Vec<Option<f64>> = vec![Some(3.0), Some(2.0), Some(1.0), Some(0.0)];
        let flat: Vec<Option<f64>> = vec![Some(5.0); 4];

        assert!((pearson(&x, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &down).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&x, &flat), None);
    }

    #[test]
    fn matrices_need_two_columns() {
        let a = Column::categorical("a", vec![Some("x"), Some("y")]);
        let b = Column::categorical("b", vec![Some("x"), Some("x")]);
        assert!(cramers_v_matrix(&[&a]).is_none());

        let matrix = cramers_v_matrix(&[&a, &b]).unwrap();
        assert_eq!(matrix.size(), 2);
        assert_eq!(matrix.get("a", "a"), Some(1.0));
        assert_eq!(matrix.get("b", "b"), Some(1.0));

        let n = Column::numeric("n", vec![Some(1.0), Some(2.0)]);
        assert!(correlation_matrix(&[&n]).is_none());
    }
}
