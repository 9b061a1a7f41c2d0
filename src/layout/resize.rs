use super::model::min_column_percent;

#[derive(Debug, Clone, Copy)]
pub struct ResizeRequest<'a> {
    pub widths: &'a [f64],
    /// The divider sits between `widths[divider_index]` and `widths[divider_index + 1]`.
    pub divider_index: usize,
    /// Positive grows the left column and shrinks the right one.
    pub delta_percent: f64,
    /// Defaults to [`min_column_percent`] for the row's column count.
    pub min_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResizeOutcome {
    pub widths: Vec<f64>,
    /// The requested delta would have pushed a column below the minimum.
    pub clamped: bool,
}

/// Moves one divider, touching only the two columns next to it.
///
/// The pair keeps its combined width, so the neighbouring columns absorb the
/// whole delta and every other column stays put. The result is renormalized
/// to sum to exactly 100.
pub fn resize_row_widths(request: &ResizeRequest<'_>) -> ResizeOutcome {
    let widths = request.widths;
    let unchanged = || ResizeOutcome {
        widths: widths.to_vec(),
        clamped: false,
    };

    if widths.len() < 2 || request.divider_index + 1 >= widths.len() {
        return unchanged();
    }
    if !request.delta_percent.is_finite() {
        return unchanged();
    }

    let min = request
        .min_percent
        .unwrap_or_else(|| min_column_percent(widths.len()));
    let left = widths[request.divider_index];
    let right = widths[request.divider_index + 1];
    let pair_total = left + right;

    let requested = left + request.delta_percent;
    let max_left = min.max(pair_total - min);
    let next_left = requested.clamp(min, max_left);
    let next_right = pair_total - next_left;

    let mut next = widths.to_vec();
    next[request.divider_index] = next_left;
    next[request.divider_index + 1] = next_right;

    ResizeOutcome {
        widths: normalize_to_100(next),
        clamped: next_left != requested,
    }
}

/// Scales every entry so the vector sums to 100, then pins the last entry to
/// whatever the others leave over so floating error cannot accumulate.
pub fn normalize_to_100(mut widths: Vec<f64>) -> Vec<f64> {
    let total: f64 = widths.iter().sum();
    if total == 0.0 || widths.is_empty() {
        return widths;
    }
    let factor = 100.0 / total;
    if factor != 1.0 {
        for width in widths.iter_mut() {
            *width *= factor;
        }
    }
    let last = widths.len() - 1;
    let fixed: f64 = widths[..last].iter().sum();
    widths[last] = 100.0 - fixed;
    widths
}
