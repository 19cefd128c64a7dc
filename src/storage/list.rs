//! Double-Ended List
//!
//! Lists are stored as two growable vectors that meet in the middle:
//!
//! ```text
//!   LPUSH a b c  ;  RPUSH x y
//!
//!   left  = [a, b, c]        right = [x, y]
//!              <- grows          grows ->
//!
//!   logical = reverse(left) ++ right = [c, b, a, x, y]
//!                                      0  1  2  3  4
//! ```
//!
//! Pushing at either end appends to the end of one vector, so a push of `k`
//! values is amortized O(k) and never moves existing elements.

use bytes::Bytes;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoubleEndedList {
    /// Head half, stored in reverse: the last element is the list's first.
    left: Vec<Bytes>,
    /// Tail half, in order.
    right: Vec<Bytes>,
}

impl DoubleEndedList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes each value onto the head, in argument order.
    ///
    /// `push_left([a, b])` leaves `b` first, as `LPUSH key a b` does.
    pub fn push_left<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = Bytes>,
    {
        self.left.extend(values);
    }

    /// Pushes each value onto the tail, in argument order.
    pub fn push_right<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = Bytes>,
    {
        self.right.extend(values);
    }

    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the list in logical order.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> + '_ {
        self.left.iter().rev().chain(self.right.iter())
    }

    /// Returns the elements between `start` and `end`, both inclusive.
    ///
    /// Negative indices count from the tail (`-1` is the last element).
    /// Out-of-range indices are clamped; an empty or inverted range yields an
    /// empty vector.
    pub fn range(&self, start: i64, end: i64) -> Vec<Bytes> {
        let len = self.len() as i64;

        let from = if start < 0 {
            len.saturating_add(start).max(0)
        } else {
            start
        };
        let to = if end < 0 {
            len.saturating_add(end).saturating_add(1)
        } else {
            end.saturating_add(1)
        }
        .min(len);

        if to <= from {
            return Vec::new();
        }

        let (from, to) = (from as usize, to as usize);
        let middle = self.left.len();

        if to <= middle {
            // logical i lives at left[middle - 1 - i]
            self.left[middle - to..middle - from]
                .iter()
                .rev()
                .cloned()
                .collect()
        } else if from >= middle {
            self.right[from - middle..to - middle].to_vec()
        } else {
            let mut out = Vec::with_capacity(to - from);
            out.extend(self.left[..middle - from].iter().rev().cloned());
            out.extend_from_slice(&self.right[..to - middle]);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(items: &[&'static str]) -> Vec<Bytes> {
        items.iter().map(|s| Bytes::from(*s)).collect()
    }

    fn mixed() -> DoubleEndedList {
        let mut list = DoubleEndedList::new();
        list.push_left(bytes(&["1", "2", "3"]));
        list.push_right(bytes(&["a", "b", "c", "d", "e"]));
        list
    }

    #[test]
    fn test_push_left_reverses() {
        let mut list = DoubleEndedList::new();
        list.push_left(bytes(&["a", "b"]));
        assert_eq!(list.range(0, -1), bytes(&["b", "a"]));
    }

    #[test]
    fn test_push_right_keeps_order() {
        let mut list = DoubleEndedList::new();
        list.push_right(bytes(&["a", "b"]));
        assert_eq!(list.range(0, -1), bytes(&["a", "b"]));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_range_straddles_both_halves() {
        let list = mixed();
        assert_eq!(list.range(1, 4), bytes(&["2", "1", "a", "b"]));
        assert_eq!(
            list.range(0, -1),
            bytes(&["3", "2", "1", "a", "b", "c", "d", "e"])
        );
    }

    #[test]
    fn test_range_within_one_half() {
        let list = mixed();
        assert_eq!(list.range(0, 1), bytes(&["3", "2"]));
        assert_eq!(list.range(1, 2), bytes(&["2", "1"]));
        assert_eq!(list.range(3, 4), bytes(&["a", "b"]));
        assert_eq!(list.range(-2, -1), bytes(&["d", "e"]));
    }

    #[test]
    fn test_range_clamps_and_rejects() {
        let list = mixed();
        assert_eq!(list.range(-100, 0), bytes(&["3"]));
        assert_eq!(list.range(6, 100), bytes(&["d", "e"]));
        assert!(list.range(5, 2).is_empty());
        assert!(list.range(8, 20).is_empty());
        assert!(list.range(0, -9).is_empty());
        assert!(DoubleEndedList::new().range(0, -1).is_empty());
    }

    #[test]
    fn test_iter_matches_full_range() {
        let list = mixed();
        let all: Vec<Bytes> = list.iter().cloned().collect();
        assert_eq!(all, list.range(0, -1));
    }
}
