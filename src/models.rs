use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use smallvec::SmallVec;

pub const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnStat {
    pub name: String,
    pub dtype: String,
    pub missing: usize,
    pub missing_pct: f64,
    pub unique: usize,
    #[serde(flatten)]
    pub details: ColumnDetails,
}

impl ColumnStat {
    pub fn kind(&self) -> ColumnKind {
        match self.details {
            ColumnDetails::Numeric(_) => ColumnKind::Numeric,
            ColumnDetails::Categorical { .. } => ColumnKind::Categorical,
        }
    }

    pub fn numeric(&self) -> Option<&NumericSummary> {
        match &self.details {
            ColumnDetails::Numeric(summary) => Some(summary),
            ColumnDetails::Categorical { .. } => None,
        }
    }

    pub fn top_values(&self) -> &[TopValue] {
        match &self.details {
            ColumnDetails::Numeric(_) => &[],
            ColumnDetails::Categorical { top_values } => top_values,
        }
    }
}

/// Type-specific half of a [`ColumnStat`]. Serializes with a `type` tag so
/// templates can branch on `stat.type == "Numeric"`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ColumnDetails {
    Numeric(NumericSummary),
    Categorical {
        top_values: SmallVec<[TopValue; TOP_VALUES]>,
    },
}

/// Numeric summary, every field rounded to 4 decimals. `NaN` where undefined.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub q1: f64,
    pub q3: f64,
}

impl NumericSummary {
    pub const UNDEFINED: NumericSummary = NumericSummary {
        min: f64::NAN,
        max: f64::NAN,
        mean: f64::NAN,
        median: f64::NAN,
        std: f64::NAN,
        q1: f64::NAN,
        q3: f64::NAN,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopValue {
    pub value: String,
    pub count: usize,
    pub pct: f64,
}

/// Square column-by-column association table. `None` cells are undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationMatrix {
    columns: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl AssociationMatrix {
    /// Builds the matrix by evaluating `cell(i, j)` for every off-diagonal pair.
    pub fn build<F>(columns: Vec<String>, mut cell: F) -> Self
    where
        F: FnMut(usize, usize) -> Option<f64>,
    {
        let n = columns.len();
        let cells = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| if i == j { Some(1.0) } else { cell(i, j) })
                    .collect()
            })
            .collect();
        Self { columns, cells }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn size(&self) -> usize {
        self.columns.len()
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == row)?;
        let j = self.columns.iter().position(|c| c == col)?;
        self.value(i, j)
    }
}

/// Serialized column-major as `{column: {row: value}}`.
impl Serialize for AssociationMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut outer = serializer.serialize_map(Some(self.columns.len()))?;
        for (j, column) in self.columns.iter().enumerate() {
            let inner: IndexMap<&str, Option<f64>> = self
                .columns
                .iter()
                .enumerate()
                .map(|(i, row)| (row.as_str(), self.value(i, j)))
                .collect();
            outer.serialize_entry(column, &inner)?;
        }
        outer.end()
    }
}

fn matrix_or_empty<S: Serializer>(
    matrix: &Option<AssociationMatrix>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match matrix {
        Some(matrix) => matrix.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Rendered PNG chart, kept as a base64 payload ready for a data URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    payload: String,
}

impl Chart {
    pub const MIME: &'static str = "image/png";

    pub fn from_png(png: &[u8]) -> Self {
        Self {
            payload: STANDARD.encode(png),
        }
    }

    pub fn base64(&self) -> &str {
        &self.payload
    }
}

impl Serialize for Chart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.payload)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Associations {
    #[serde(serialize_with = "matrix_or_empty")]
    pub numeric_matrix: Option<AssociationMatrix>,
    #[serde(serialize_with = "matrix_or_empty")]
    pub categorical_matrix: Option<AssociationMatrix>,
    pub numeric_img: Option<Chart>,
    pub categorical_img: Option<Chart>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Relationships {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairplot: Option<Chart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatterplot: Option<Chart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat_num: Option<Chart>,
}

impl Relationships {
    pub fn len(&self) -> usize {
        [&self.pairplot, &self.scatterplot, &self.cat_num]
            .iter()
            .filter(|chart| chart.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
