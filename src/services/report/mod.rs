pub mod associations;
pub mod charts;
pub mod preview;
pub mod stats;
pub mod template;

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use indexmap::IndexMap;
use minijinja::context;
use rand::rngs::StdRng;
use rand::{seq::index, SeedableRng};

use crate::config::DEFAULT_TITLE;
use crate::error::AppError;
use crate::models::{Associations, Chart, ColumnStat, Relationships};
use crate::services::dataset::{Column, Dataset};
use charts::Palette;

pub use template::TemplateSource;

/// Row cap for the sampled relationship charts.
pub const SAMPLE_ROWS: usize = 500;
/// Number of leading numeric columns drawn in the pair grid.
pub const PAIR_GRID_COLUMNS: usize = 5;
/// Number of categories shown in a categorical count chart.
pub const COUNT_PLOT_CATEGORIES: usize = 10;

/// Finished report: every computed artifact plus the rendered HTML.
#[derive(Debug, Clone)]
pub struct Report {
    pub title: String,
    pub shape: (usize, usize),
    pub column_stats: Vec<ColumnStat>,
    pub numeric_cols: Vec<String>,
    pub categorical_cols: Vec<String>,
    pub correlations: Associations,
    pub distributions: IndexMap<String, Chart>,
    pub relationships: Relationships,
    html: String,
}

impl Report {
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AppError> {
        let path = path.as_ref();
        std::fs::write(path, self.html.as_bytes())?;
        tracing::info!("Report saved to {} ({}KB)", path.display(), self.html.len() / 1024);
        Ok(())
    }
}

/// Computes every report section for one dataset.
pub struct ReportGenerator {
    dataset: Dataset,
    seed: Option<u64>,
}

impl ReportGenerator {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset, seed: None }
    }

    /// Fixes the row sample used by the relationship charts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn column_stats(&self) -> Vec<ColumnStat> {
        stats::column_stats(&self.dataset)
    }

    pub fn associations(&self) -> Result<Associations, AppError> {
        let mut result = Associations::default();

        if let Some(matrix) = associations::correlation_matrix(&self.dataset.numeric_columns()) {
            result.numeric_img = Some(charts::heatmap(
                &matrix,
                "Numeric Correlation Matrix",
                Palette::CoolWarm,
            )?);
            result.numeric_matrix = Some(matrix);
        }

        if let Some(matrix) = associations::cramers_v_matrix(&self.dataset.categorical_columns()) {
            result.categorical_img = Some(charts::heatmap(
                &matrix,
                "Categorical Association (Cramer's V)",
                Palette::Blues,
            )?);
            result.categorical_matrix = Some(matrix);
        }

        Ok(result)
    }

    /// One chart per column: numeric columns first, then categorical ones,
    /// each in declaration order.
    pub fn distributions(&self) -> Result<IndexMap<String, Chart>, AppError> {
        let mut rendered = IndexMap::new();

        for column in self.dataset.numeric_columns() {
            let values: Vec<f64> = column.as_numeric().unwrap_or_default().iter().flatten().copied().collect();
            rendered.insert(column.name.clone(), charts::numeric_distribution(&column.name, &values)?);
        }

        for column in self.dataset.categorical_columns() {
            let counts: Vec<(String, usize)> = stats::value_counts(column.as_categorical().unwrap_or_default())
                .into_iter()
                .take(COUNT_PLOT_CATEGORIES)
                .map(|(value, count)| (value.to_string(), count))
                .collect();
            rendered.insert(column.name.clone(), charts::category_counts(&column.name, &counts)?);
        }

        Ok(rendered)
    }

    /// Relationship charts. Column choice is positional: the first numeric
    /// columns and the first categorical column, in declaration order.
    pub fn relationships(&self) -> Result<Relationships, AppError> {
        let numeric = self.dataset.numeric_columns();
        let categorical = self.dataset.categorical_columns();
        let mut result = Relationships::default();

        if numeric.len() >= 2 {
            let rows = self.sample_rows();
            tracing::debug!("Relationship sample: {} of {} rows", rows.len(), self.dataset.height());

            let grid: Vec<(String, Vec<Option<f64>>)> = numeric
                .iter()
                .take(PAIR_GRID_COLUMNS)
                .map(|column| (column.name.clone(), sampled(column, &rows)))
                .collect();
            result.pairplot = Some(charts::pair_grid(&grid)?);

            let points: Vec<(f64, f64)> = grid[0]
                .1
                .iter()
                .zip(&grid[1].1)
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                .collect();
            result.scatterplot = Some(charts::scatter(&grid[0].0, &grid[1].0, &points)?);
        }

        if let (Some(cat), Some(num)) = (categorical.first(), numeric.first()) {
            let groups = group_by_category(cat, num);
            result.cat_num = Some(charts::grouped_numeric(&cat.name, &num.name, &groups)?);
        }

        Ok(result)
    }

    fn sample_rows(&self) -> Vec<usize> {
        let height = self.dataset.height();
        let amount = height.min(SAMPLE_ROWS);
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut rows = index::sample(&mut rng, height, amount).into_vec();
        rows.sort_unstable();
        rows
    }

    /// Runs the whole pipeline and renders `template`. The template is loaded
    /// first so a missing file aborts before any computation.
    pub fn generate(&self, title: &str, template: &TemplateSource) -> Result<Report, AppError> {
        let start = Instant::now();
        let source = template.load()?;
        tracing::info!(
            "Generating report '{}' for {} rows x {} columns",
            title,
            self.dataset.height(),
            self.dataset.width()
        );

        let step = Instant::now();
        let column_stats = self.column_stats();
        tracing::info!("Column statistics computed in {:?}", step.elapsed());

        let step = Instant::now();
        let correlations = self.associations()?;
        tracing::info!("Associations computed in {:?}", step.elapsed());

        let step = Instant::now();
        let distributions = self.distributions()?;
        tracing::info!("{} distribution charts rendered in {:?}", distributions.len(), step.elapsed());

        let step = Instant::now();
        let relationships = self.relationships()?;
        tracing::info!("{} relationship charts rendered in {:?}", relationships.len(), step.elapsed());

        let numeric_cols: Vec<String> = self.dataset.numeric_columns().iter().map(|c| c.name.clone()).collect();
        let categorical_cols: Vec<String> =
            self.dataset.categorical_columns().iter().map(|c| c.name.clone()).collect();
        let shape = self.dataset.shape();

        let html = template::render_template(
            &source,
            context! {
                title => title,
                now => chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                dataset_head => preview::preview_table(&self.dataset),
                shape => [shape.0, shape.1],
                column_stats => &column_stats,
                numeric_cols => &numeric_cols,
                categorical_cols => &categorical_cols,
                correlations => &correlations,
                distributions => &distributions,
                relationships => &relationships,
                chart_mime => Chart::MIME,
            },
        )?;
        tracing::info!("Report rendered in {:?} ({}KB)", start.elapsed(), html.len() / 1024);

        Ok(Report {
            title: title.to_string(),
            shape,
            column_stats,
            numeric_cols,
            categorical_cols,
            correlations,
            distributions,
            relationships,
            html,
        })
    }
}

fn sampled(column: &Column, rows: &[usize]) -> Vec<Option<f64>> {
    let values = column.as_numeric().unwrap_or_default();
    rows.iter().map(|&row| values.get(row).copied().flatten()).collect()
}

/// Values of `num` split by `cat`, categories in first-appearance order.
/// Rows missing either value are dropped.
fn group_by_category(cat: &Column, num: &Column) -> Vec<(String, Vec<f64>)> {
    let labels = cat.as_categorical().unwrap_or_default();
    let values = num.as_numeric().unwrap_or_default();

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
    for (label, value) in labels.iter().zip(values) {
        let (Some(label), Some(value)) = (label, value) else { continue };
        let slot = *index.entry(label.as_str()).or_insert_with(|| {
            groups.push((label.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(*value);
    }
    groups
}

/// Renders `dataset` into `template` with the default title.
pub fn render(dataset: &Dataset, template: &TemplateSource) -> Result<String, AppError> {
    ReportGenerator::new(dataset.clone())
        .generate(DEFAULT_TITLE, template)
        .map(Report::into_html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_dataset(rows: usize) -> Dataset {
        let n = |f: fn(usize) -> f64| (0..rows).map(|i| Some(f(i))).collect::<Vec<_>>();
        Dataset::new(vec![
            Column::numeric("a", n(|i| i as f64)),
            Column::categorical("group", (0..rows).map(|i| Some(["x", "y", "z"][i % 3])).collect()),
            Column::numeric("b", n(|i| (i * i) as f64)),
        ])
        .unwrap()
    }

    #[test]
    fn sample_is_capped_and_reproducible() {
        let generator = ReportGenerator::new(mixed_dataset(1200)).with_seed(7);
        let first = generator.sample_rows();
        assert_eq!(first.len(), SAMPLE_ROWS);
        assert_eq!(first, generator.sample_rows());
        assert!(first.windows(2).all(|w| w[0] < w[1]));

        let small = ReportGenerator::new(mixed_dataset(12)).with_seed(7);
        assert_eq!(small.sample_rows(), (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn groups_follow_first_appearance() {
        let cat = Column::categorical("c", vec![Some("b"), Some("a"), None, Some("b")]);
        let num = Column::numeric("n", vec![Some(1.0), Some(2.0), Some(3.0), None]);
        let groups = group_by_category(&cat, &num);
        assert_eq!(groups, vec![("b".to_string(), vec![1.0]), ("a".to_string(), vec![2.0])]);
    }

    #[test]
    fn relationships_need_matching_columns() {
        let only_numeric = Dataset::new(vec![Column::numeric("solo", vec![Some(1.0), Some(2.0)])]).unwrap();
        let rel = ReportGenerator::new(only_numeric).relationships().unwrap();
        assert!(rel.is_empty());

        let rel = ReportGenerator::new(mixed_dataset(30)).with_seed(1).relationships().unwrap();
        assert_eq!(rel.len(), 3);
    }

    #[test]
    fn distribution_per_column() {
        let charts = ReportGenerator::new(mixed_dataset(20)).distributions().unwrap();
        let keys: Vec<&str> = charts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "group"]);
    }

    #[test]
    fn distributions_keep_column_order() {
        let dataset = Dataset::new(vec![
            Column::categorical("zone", vec![Some("n"), Some("s"), Some("n")]),
            Column::numeric("weight", vec![Some(3.0), Some(1.0), Some(2.0)]),
            Column::categorical("brand", vec![Some("x"), None, Some("y")]),
            Column::numeric("age", vec![Some(30.0), Some(41.0), None]),
        ])
        .unwrap();
        let generator = ReportGenerator::new(dataset);
        let charts = generator.distributions().unwrap();
        let keys: Vec<&str> = charts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["weight", "age", "zone", "brand"]);

        let html = generator
            .generate(
                "t",
                &TemplateSource::Inline("{% for name, img in distributions.items() %}{{ name }};{% endfor %}".into()),
            )
            .unwrap()
            .into_html();
        assert_eq!(html, "weight;age;zone;brand;");
    }
}
