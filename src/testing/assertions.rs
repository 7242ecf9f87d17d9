//! Assertion functions for pipeline output.

use crate::value::{ErrorValue, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use ironpipe::testing::{assert_collections_equal, ints};
///
/// assert_collections_equal(&ints([1, 2, 3]), &ints(1..=3));
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

fn counts<T: Eq + Hash>(xs: &[T]) -> HashMap<&T, usize> {
    let mut m = HashMap::new();
    for x in xs {
        *m.entry(x).or_insert(0) += 1;
    }
    m
}

/// Assert that two collections hold the same elements with the same
/// multiplicities, in any order.
///
/// # Panics
///
/// Panics if the collections differ as multisets.
///
/// # Example
///
/// ```
/// use ironpipe::testing::{assert_collections_unordered_equal, ints};
///
/// assert_collections_unordered_equal(&ints([3, 1, 1, 2]), &ints([1, 2, 3, 1]));
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    let (a, e) = (counts(actual), counts(expected));
    if a != e {
        let missing: Vec<_> = e.keys().filter(|k| a.get(*k) < e.get(*k)).collect();
        let extra: Vec<_> = a.keys().filter(|k| e.get(*k) < a.get(*k)).collect();
        panic!(
            "Collection content mismatch:\n  Missing elements: {missing:?}\n  Extra elements: {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
        );
    }
}

/// The error elements of `values`, in order.
pub fn errors_of(values: &[Value]) -> Vec<&ErrorValue> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Error(e) => Some(e),
            _ => None,
        })
        .collect()
}

/// Assert that `values` holds no error elements.
///
/// # Panics
///
/// Panics on the first error element.
pub fn assert_no_errors(values: &[Value]) {
    if let Some(e) = errors_of(values).first() {
        panic!("Unexpected error element: {e}\n  Collection: {values:?}");
    }
}

/// Assert that some error element's message contains `needle`.
///
/// # Panics
///
/// Panics if none does.
///
/// # Example
///
/// ```
/// use ironpipe::Value;
/// use ironpipe::testing::assert_error_containing;
///
/// assert_error_containing(&[Value::Int(1), Value::error("division by zero")], "by zero");
/// ```
pub fn assert_error_containing(values: &[Value], needle: &str) {
    assert!(
        errors_of(values).iter().any(|e| e.message.contains(needle)),
        "No error element contains {needle:?}:\n  Collection: {values:?}"
    );
}

/// Assert that all elements in a collection satisfy a predicate.
///
/// # Panics
///
/// Panics if any element does not satisfy the predicate.
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}\n  Collection: {collection:?}"
        );
    }
}

/// Assert that a collection contains a specific element.
///
/// # Panics
///
/// Panics if the element is not found in the collection.
pub fn assert_contains<T: Debug + PartialEq>(collection: &[T], element: &T) {
    assert!(
        collection.contains(element),
        "Element not found in collection:\n  Looking for: {element:?}\n  Collection: {collection:?}"
    );
}
