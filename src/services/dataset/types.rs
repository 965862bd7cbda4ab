use polars::prelude::*;

use crate::error::AppError;
use crate::models::ColumnKind;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(values) => values.len(),
            ColumnValues::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: String,
    /// Integer source dtype; only affects how preview cells are printed.
    pub integral: bool,
    pub values: ColumnValues,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let values = values
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        Self {
            name: name.into(),
            dtype: "f64".to_string(),
            integral: false,
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn categorical<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self {
            name: name.into(),
            dtype: "str".to_string(),
            integral: false,
            values: ColumnValues::Categorical(values.into_iter().map(|v| v.map(Into::into)).collect()),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self.values {
            ColumnValues::Numeric(_) => ColumnKind::Numeric,
            ColumnValues::Categorical(_) => ColumnKind::Categorical,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.values {
            ColumnValues::Numeric(values) => Some(values),
            ColumnValues::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&[Option<String>]> {
        match &self.values {
            ColumnValues::Categorical(values) => Some(values),
            ColumnValues::Numeric(_) => None,
        }
    }

    pub fn missing(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(values) => values.iter().filter(|v| v.is_none()).count(),
            ColumnValues::Categorical(values) => values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Display text for one cell, `NaN` for missing values.
    pub fn display(&self, row: usize) -> String {
        match &self.values {
            ColumnValues::Numeric(values) => match values.get(row).copied().flatten() {
                Some(v) if self.integral && v.fract() == 0.0 => format!("{}", v as i64),
                Some(v) => format!("{}", v),
                None => "NaN".to_string(),
            },
            ColumnValues::Categorical(values) => values
                .get(row)
                .and_then(|v| v.clone())
                .unwrap_or_else(|| "NaN".to_string()),
        }
    }

    fn from_series(series: &Series) -> Result<Self, AppError> {
        let dtype = series.dtype();
        let name = series.name().to_string();
        let label = dtype.to_string();

        if is_numeric_dtype(dtype) {
            let floats = series.cast(&DataType::Float64)?;
            let values = floats
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            Ok(Self {
                name,
                dtype: label,
                integral: is_integer_dtype(dtype),
                values: ColumnValues::Numeric(values),
            })
        } else {
            let strings = series.cast(&DataType::String)?;
            let values = strings
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect();
            Ok(Self {
                name,
                dtype: label,
                integral: false,
                values: ColumnValues::Categorical(values),
            })
        }
    }
}

fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Column-oriented table with every column classified as numeric or categorical.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    height: usize,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Result<Self, AppError> {
        let height = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != height) {
            return Err(AppError::InvalidInput(format!(
                "Column '{}' has {} rows, expected {}",
                bad.name,
                bad.len(),
                height
            )));
        }
        Ok(Self { columns, height })
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self, AppError> {
        let columns = df
            .get_columns()
            .iter()
            .map(Column::from_series)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.columns.len())
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.kind() == ColumnKind::Numeric).collect()
    }

    pub fn categorical_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.kind() == ColumnKind::Categorical).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_columns_are_classified_by_dtype() {
        let df = df!(
            "age" => &[Some(31i64), None, Some(45)],
            "score" => &[1.5f64, f64::INFINITY, 2.0],
            "city" => &[Some("Lisbon"), Some("Porto"), None],
            "active" => &[true, false, true]
        )
        .unwrap();

        let dataset = Dataset::from_frame(&df).unwrap();
        assert_eq!(dataset.shape(), (3, 4));

        let kinds: Vec<_> = dataset.columns().iter().map(Column::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Numeric,
                ColumnKind::Numeric,
                ColumnKind::Categorical,
                ColumnKind::Categorical
            ]
        );

        let age = dataset.column("age").unwrap();
        assert!(age.integral);
        assert_eq!(age.display(0), "31");
        assert_eq!(age.display(1), "NaN");

        // infinities are treated as missing
        assert_eq!(dataset.column("score").unwrap().missing(), 1);
        assert_eq!(dataset.column("city").unwrap().missing(), 1);
    }

    #[test]
    fn ragged_columns_are_rejected() {
        let err = Dataset::new(vec![
            Column::numeric("a", vec![Some(1.0), Some(2.0)]),
            Column::numeric("b", vec![Some(1.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn empty_dataset_has_zero_shape() {
        let dataset = Dataset::new(Vec::new()).unwrap();
        assert_eq!(dataset.shape(), (0, 0));
        assert!(dataset.numeric_columns().is_empty());
    }
}
