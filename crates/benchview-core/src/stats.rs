//! Summary statistics over numeric column values.

use serde::{Deserialize, Serialize};

use crate::{ColIdx, Dataset, RawValue, ToolIdx};

/// Summary of a list of numbers.
///
/// Non-finite results are serialized as the strings `"NaN"`, `"Infinity"`
/// and `"-Infinity"` because JSON has no literal for them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatValue {
    #[serde(with = "json_float")]
    pub sum: f64,
    #[serde(with = "json_float::opt", default)]
    pub min: Option<f64>,
    #[serde(with = "json_float::opt", default)]
    pub max: Option<f64>,
    #[serde(with = "json_float::opt", default)]
    pub avg: Option<f64>,
    #[serde(with = "json_float::opt", default)]
    pub median: Option<f64>,
    #[serde(with = "json_float::opt", default)]
    pub stdev: Option<f64>,
}

impl StatValue {
    fn only_sum(sum: f64) -> Self {
        Self {
            sum,
            min: None,
            max: None,
            avg: None,
            median: None,
            stdev: None,
        }
    }

    /// Compute the statistics of the present values.
    ///
    /// A single NaN poisons every field. Infinite values make sum, mean and
    /// standard deviation infinite (or NaN when both signs occur).
    pub fn from_values(values: &[Option<f64>]) -> Self {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
        if sorted.iter().any(|v| v.is_nan()) {
            let nan = Some(f64::NAN);
            return Self {
                sum: f64::NAN,
                min: nan,
                max: nan,
                avg: nan,
                median: nan,
                stdev: nan,
            };
        }
        if sorted.is_empty() {
            return Self::only_sum(0.0);
        }
        sorted.sort_by(f64::total_cmp);

        let len = sorted.len();
        let min = sorted[0];
        let max = sorted[len - 1];

        let (sum, avg, stdev) = if min == f64::NEG_INFINITY && max == f64::INFINITY {
            (f64::NAN, f64::NAN, f64::NAN)
        } else if max == f64::INFINITY {
            (f64::INFINITY, f64::INFINITY, f64::INFINITY)
        } else if min == f64::NEG_INFINITY {
            (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY)
        } else {
            let sum: f64 = sorted.iter().sum();
            let avg = sum / len as f64;
            let variance = sorted.iter().map(|v| (v - avg) * (v - avg)).sum::<f64>() / len as f64;
            (sum, avg, variance.sqrt())
        };

        let half = len / 2;
        let median = if len % 2 == 1 {
            sorted[half]
        } else {
            (sorted[half - 1] + sorted[half]) / 2.0
        };

        Self {
            sum,
            min: Some(min),
            max: Some(max),
            avg: Some(avg),
            median: Some(median),
            stdev: Some(stdev),
        }
    }
}

/// Numeric values of one column for the given rows, in row order.
///
/// Rows without a finite number in that column yield `None`.
pub fn column_values(
    dataset: &Dataset,
    rows: &[usize],
    tool: ToolIdx,
    col: ColIdx,
) -> Vec<Option<f64>> {
    rows.iter()
        .map(|&i| {
            dataset
                .rows
                .get(i)
                .and_then(|row| row.raw(tool, col))
                .and_then(RawValue::as_number)
        })
        .collect()
}

mod json_float {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_str("NaN")
        } else if v.is_infinite() {
            s.serialize_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        from_value(Value::deserialize(d)?)
            .ok_or_else(|| serde::de::Error::custom("expected a number"))
    }

    fn from_value(v: Value) -> Option<f64> {
        match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => match s.as_str() {
                "NaN" => Some(f64::NAN),
                "Infinity" => Some(f64::INFINITY),
                "-Infinity" => Some(f64::NEG_INFINITY),
                _ => None,
            },
            _ => None,
        }
    }

    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(v) => super::serialize(v, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
            match Value::deserialize(d)? {
                Value::Null => Ok(None),
                other => from_value(other)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom("expected a number or null")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_statistics() {
        let s = StatValue::from_values(&[Some(4.0), None, Some(1.0), Some(3.0), Some(2.0)]);
        assert_eq!(s.sum, 10.0);
        assert_eq!(s.min, Some(1.0));
        assert_eq!(s.max, Some(4.0));
        assert_eq!(s.avg, Some(2.5));
        assert_eq!(s.median, Some(2.5));
        assert!((s.stdev.unwrap() - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_odd_median_and_empty() {
        let s = StatValue::from_values(&[Some(5.0), Some(1.0), Some(3.0)]);
        assert_eq!(s.median, Some(3.0));

        let empty = StatValue::from_values(&[None, None]);
        assert_eq!(empty.sum, 0.0);
        assert!(empty.min.is_none() && empty.median.is_none());
    }

    #[test]
    fn test_nan_poisons_everything() {
        let s = StatValue::from_values(&[Some(1.0), Some(f64::NAN)]);
        assert!(s.sum.is_nan());
        assert!(s.median.unwrap().is_nan());
    }

    #[test]
    fn test_infinities() {
        let s = StatValue::from_values(&[Some(1.0), Some(f64::INFINITY)]);
        assert_eq!(s.sum, f64::INFINITY);
        assert_eq!(s.stdev, Some(f64::INFINITY));

        let s = StatValue::from_values(&[Some(f64::NEG_INFINITY), Some(1.0)]);
        assert_eq!(s.avg, Some(f64::NEG_INFINITY));
        assert_eq!(s.stdev, Some(f64::INFINITY));

        let s = StatValue::from_values(&[Some(f64::NEG_INFINITY), Some(f64::INFINITY)]);
        assert!(s.sum.is_nan());
        assert_eq!(s.min, Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_non_finite_survive_json() {
        let s = StatValue::from_values(&[Some(1.0), Some(f64::INFINITY)]);
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["sum"], "Infinity");
        let back: StatValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
