use num_traits::Float;

/// Sum of the non-missing (`NaN`) values.
pub fn nan_sum<T, I>(values: I) -> T
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(T::zero(), |acc, v| acc + v)
}

/// Mean of the non-missing values, `None` if there are none.
pub fn nan_mean<T, I>(values: I) -> Option<T>
where
    T: Float,
    I: IntoIterator<Item = T>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((T::zero(), 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        None
    } else {
        T::from(count).map(|n| sum / n)
    }
}

/// Split a row into the non-missing values of two column groups.
pub fn split_groups(row: &[f64], group1_indices: &[usize], group2_indices: &[usize]) -> (Vec<f64>, Vec<f64>) {
    let pick = |indices: &[usize]| {
        indices
            .iter()
            .map(|&i| row[i])
            .filter(|v| !v.is_nan())
            .collect::<Vec<_>>()
    };
    (pick(group1_indices), pick(group2_indices))
}

/// Median of a non-empty slice of finite values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Trigamma function, the derivative of digamma.
///
/// Shifts `x` above 10 with the recurrence `psi1(x) = psi1(x + 1) + 1/x^2`, then uses
/// the asymptotic expansion.
pub fn trigamma(x: f64) -> f64 {
    if x <= 0.0 && x == x.floor() {
        return f64::INFINITY;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 10.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let x2 = 1.0 / (x * x);
    acc + 1.0 / x
        + x2 / 2.0
        + x2 / x * (1.0 / 6.0 - x2 * (1.0 / 30.0 - x2 * (1.0 / 42.0 - x2 / 30.0)))
}

/// Tetragamma function, the second derivative of digamma.
pub fn tetragamma(x: f64) -> f64 {
    let mut x = x;
    let mut acc = 0.0;
    while x < 10.0 {
        acc -= 2.0 / (x * x * x);
        x += 1.0;
    }
    let x2 = 1.0 / (x * x);
    acc - x2 / x
        - x2 * (1.0 + x2 * (0.5 - x2 * (1.0 / 6.0 - x2 * (1.0 / 6.0 - x2 * 0.3))))
}

/// Solve `trigamma(y) = x` for `y > 0` by Newton iteration.
pub fn trigamma_inverse(x: f64) -> f64 {
    if !x.is_finite() || x <= 0.0 {
        return f64::NAN;
    }
    if x > 1e7 {
        return 1.0 / x.sqrt();
    }
    if x < 1e-6 {
        return 1.0 / x;
    }

    let mut y = 0.5 + 1.0 / x;
    for _ in 0..50 {
        let tri = trigamma(y);
        let dif = tri * (1.0 - tri / x) / tetragamma(y);
        y += dif;
        if -dif / y < 1e-8 {
            break;
        }
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_aware_reductions() {
        let values = [1.0, f64::NAN, 3.0];
        assert_eq!(nan_sum(values), 4.0);
        assert_eq!(nan_mean(values), Some(2.0));
        assert_eq!(nan_mean([f64::NAN, f64::NAN]), None);
        assert_eq!(nan_sum([f32::NAN]), 0.0f32);
    }

    #[test]
    fn test_split_groups_skips_missing() {
        let row = [1.0, f64::NAN, 3.0, 4.0, f64::NAN];
        let (a, b) = split_groups(&row, &[0, 1, 2], &[3, 4]);
        assert_eq!(a, vec![1.0, 3.0]);
        assert_eq!(b, vec![4.0]);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_trigamma_known_values() {
        // psi1(1) = pi^2 / 6, psi1(1/2) = pi^2 / 2
        let pi2 = std::f64::consts::PI * std::f64::consts::PI;
        assert_relative_eq!(trigamma(1.0), pi2 / 6.0, max_relative = 1e-10);
        assert_relative_eq!(trigamma(0.5), pi2 / 2.0, max_relative = 1e-10);
        assert_relative_eq!(trigamma(10.0), 0.105_166_335_681_685_3, max_relative = 1e-10);
    }

    #[test]
    fn test_tetragamma_known_value() {
        // psi2(1) = -2 * zeta(3)
        assert_relative_eq!(tetragamma(1.0), -2.404_113_806_319_188_5, max_relative = 1e-10);
    }

    #[test]
    fn test_trigamma_inverse_round_trip() {
        for &y in &[0.3, 1.0, 2.5, 7.0, 40.0] {
            assert_relative_eq!(trigamma_inverse(trigamma(y)), y, max_relative = 1e-6);
        }
        assert!(trigamma_inverse(-1.0).is_nan());
    }
}
