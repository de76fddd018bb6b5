//! Shared math utilities for detection infrastructure.
//!
//! Union-find clustering used by cascade candidate grouping.

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// Splits `items` into equivalence classes under the (symmetric) predicate.
///
/// Returns `(labels, class_count)`; labels are numbered in order of each
/// class's first member, so the output is deterministic.
pub fn partition<T>(items: &[T], same_class: impl Fn(&T, &T) -> bool) -> (Vec<usize>, usize) {
    let n = items.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if same_class(&items[i], &items[j]) {
                union(&mut parent, i, j);
            }
        }
    }

    let mut root_label: Vec<Option<usize>> = vec![None; n];
    let mut labels = Vec::with_capacity(n);
    let mut count = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        let label = *root_label[root].get_or_insert_with(|| {
            count += 1;
            count - 1
        });
        labels.push(label);
    }
    (labels, count)
}
