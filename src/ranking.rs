use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Stable sort on a numeric key, then keep the first `n`. Items with equal
/// keys keep their input order; NaN keys sort last in either direction.
pub fn top_n_by<T, F>(mut items: Vec<T>, order: SortOrder, n: usize, key: F) -> Vec<T>
where
    F: Fn(&T) -> f64,
{
    items.sort_by(|a, b| compare(key(a), key(b), order));
    items.truncate(n);
    items
}

fn compare(a: f64, b: f64, order: SortOrder) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match order {
            SortOrder::Ascending => a.total_cmp(&b),
            SortOrder::Descending => b.total_cmp(&a),
        },
    }
}

/// Index of the first maximum, skipping missing values.
pub fn argmax<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.into_iter().enumerate() {
        let Some(value) = value.filter(|v| !v.is_nan()) else {
            continue;
        };
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}
