/// Sums floating-point values with Neumaier compensation.
///
/// The running compensation term keeps the result independent of input order to
/// within one rounding of the exact sum for the magnitudes met in charge totals.
pub fn compensated_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for value in values {
        let t = sum + value;
        if sum.abs() >= value.abs() {
            compensation += (sum - t) + value;
        } else {
            compensation += (value - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}
