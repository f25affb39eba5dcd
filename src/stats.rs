//! Small summary statistics over optional fractions. Undefined inputs are
//! skipped, matching how the metric table treats missing values.

use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Median of the defined values, averaging the middle pair for even counts.
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let v = defined(values);
    if v.is_empty() {
        return None;
    }
    Some(Data::new(v).median())
}

pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let v = defined(values);
    if v.is_empty() {
        return None;
    }
    Some((&v).mean())
}

/// Sample standard deviation (n - 1 denominator); undefined below two values.
pub fn sample_std<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let v = defined(values);
    if v.len() < 2 {
        return None;
    }
    Some((&v).std_dev())
}

pub fn min<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let v = defined(values);
    if v.is_empty() {
        return None;
    }
    Some(Statistics::min(&v))
}

/// max - min of the defined values.
pub fn range<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let v = defined(values);
    if v.is_empty() {
        return None;
    }
    Some(Statistics::max(&v) - Statistics::min(&v))
}

fn defined<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_skips_missing() {
        assert_eq!(median([Some(0.3), None, Some(0.1), Some(0.2)]), Some(0.2));
        assert_relative_eq!(median([Some(0.1), Some(0.4)]).unwrap(), 0.25);
        assert_eq!(median([None, None]), None);
        assert_eq!(median(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn std_uses_sample_denominator() {
        assert_relative_eq!(
            sample_std([Some(1.0), Some(2.0), Some(3.0), Some(4.0)]).unwrap(),
            1.2909944487358056,
            epsilon = 1e-12
        );
        assert_eq!(sample_std([Some(1.0)]), None);
    }

    #[test]
    fn range_and_min() {
        assert_relative_eq!(range([Some(0.05), Some(0.2), None]).unwrap(), 0.15);
        assert_eq!(min([Some(0.9), Some(0.7)]), Some(0.7));
        assert_eq!(range(Vec::<Option<f64>>::new()), None);
        assert_eq!(mean([Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(min(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn nan_inputs_are_treated_as_missing() {
        let values = [Some(0.02), Some(f64::NAN), None, Some(0.28), Some(0.15)];
        assert_relative_eq!(median(values).unwrap(), 0.15);
        assert_relative_eq!(mean(values).unwrap(), 0.15, epsilon = 1e-12);
        assert_relative_eq!(sample_std(values).unwrap(), 0.13, epsilon = 1e-12);
        assert_relative_eq!(range(values).unwrap(), 0.26, epsilon = 1e-12);
        assert_eq!(sample_std([Some(f64::NAN), Some(0.4)]), None);
    }
}
