use std::collections::VecDeque;
use std::vec::IntoIter;

/// An iterator that supports arbitrary-length peeking.
///
/// This struct is a beefed-up version of rustlib's [`Peekable`], which supports only peeking at the
/// next item in an iterator. Multi-length peeks may be required by applications that need to
/// establish a context; for example, a scanner deciding between a prefix and a postfix operator.
///
/// [`Peekable`]: core::iter::Peekable
pub struct PeekIter<T>
where
    T: Clone,
{
    iter: IntoIter<T>,
    /// A store of items we had to consume from the iterator for peeking.
    lookahead: VecDeque<Option<T>>,
}

impl<T> PeekIter<T>
where
    T: Clone,
{
    pub fn new(iter: IntoIter<T>) -> Self {
        let mut lookahead = VecDeque::new();
        lookahead.reserve(5); // optimistically we won't be peeking more than this

        Self { iter, lookahead }
    }

    /// Returns a reference to the next value in the iterator, without consuming it, or `None` if
    /// the iteration is complete.
    pub fn peek(&mut self) -> Option<&T> {
        self.peek_at(0)
    }

    /// Returns a reference to the `n`th (zero-indexed) value in the iterator without consuming
    /// anything.
    pub fn peek_at(&mut self, n: usize) -> Option<&T> {
        while self.lookahead.len() <= n {
            let next = self.iter.next();
            self.lookahead.push_back(next);
        }
        self.lookahead[n].as_ref()
    }

    /// Consumes items for as long as they satisfy `predicate`, collecting them into a `C`.
    ///
    /// Unlike [`TakeWhile`](core::iter::TakeWhile), the first item failing the predicate is not
    /// consumed.
    pub fn collect_while<P, C>(&mut self, predicate: P) -> C
    where
        P: Fn(&T) -> bool,
        C: std::iter::FromIterator<T>,
    {
        let mut items = Vec::new();
        while let Some(item) = self.peek() {
            if !predicate(item) {
                break;
            }
            items.push(self.next().unwrap());
        }
        items.into_iter().collect()
    }

    /// Adds an item to the front of the current iteration.
    #[allow(unused)]
    pub fn push_front(&mut self, item: T) {
        self.lookahead.push_front(Some(item));
    }
}

impl<T> Iterator for PeekIter<T>
where
    T: Clone,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.lookahead
            .pop_front()
            // Note that unwrap_or *cannot* be used here because it is eagerly evaluated, and would
            // advance `self.iter` before the lookahead is checked!
            .unwrap_or_else(|| self.iter.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() {
        let mut iter = PeekIter::new(vec![1, 2, 3].into_iter());
        assert_eq!(iter.peek(), Some(&1));
        assert_eq!(iter.peek_at(2), Some(&3));
        assert_eq!(iter.next(), Some(1));
        assert_eq!(iter.next(), Some(2));
    }

    #[test]
    fn collect_while_leaves_failing_item() {
        let mut iter = PeekIter::new("abc1".chars().collect::<Vec<_>>().into_iter());
        let alpha: String = iter.collect_while(|c| c.is_alphabetic());
        assert_eq!(alpha, "abc");
        assert_eq!(iter.next(), Some('1'));
    }
}
