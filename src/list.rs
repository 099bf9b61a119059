use crate::util::mutex::{Mutex, MutexGuard};
use alloc::boxed::Box;
use core::{fmt, mem, ptr::NonNull};

#[cfg(all(test, feature = "std"))]
mod tests;

/// A singly-linked list whose nodes are each protected by their own lock.
///
/// Every operation walks the chain from the head using *hand-over-hand*
/// locking (lock coupling): a thread holds at most two adjacent node locks
/// at a time, and always locks the next node before releasing the current
/// one. Threads working on different parts of the list therefore proceed
/// concurrently, while no thread can ever see a link that is being
/// rewritten, or a node that is being freed, underneath it.
///
/// New elements are only ever inserted at the front, so the list reads in
/// reverse insertion order.
///
/// # Consistency
///
/// There is no list-wide lock. Each callback observes its element while
/// that element's lock is held, but a traversal is *not* a snapshot:
/// elements pushed after the traversal has passed the head, or removed
/// after the cursor has passed them, are not revisited. Multi-step queries
/// (such as [`len`]) are only as consistent as their individual per-node
/// observations.
///
/// # Callbacks
///
/// Visitors and predicates run while node locks are held. They must not
/// block on, or call back into, the same list; locks are acquired strictly
/// from head to tail, and a re-entrant call would wait on a lock its own
/// thread holds. A callback that panics releases every lock it was called
/// under, and the list remains usable.
///
/// # Examples
///
/// ```
/// use handover::ConcurrentList;
///
/// let list = ConcurrentList::new();
/// for i in [2, 3, 4, -1, 6] {
///     list.push_front(i);
/// }
///
/// list.remove_if(|&i| i < 0);
///
/// let mut seen = Vec::new();
/// list.for_each(|&i| seen.push(i));
/// assert_eq!(seen, [6, 4, 3, 2]);
/// ```
///
/// [`len`]: ConcurrentList::len
pub struct ConcurrentList<T> {
    /// The sentinel: the permanent entry point, holding no element.
    head: Mutex<Link<T>>,
}

/// What [`ConcurrentList::update_first_if`] ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Update {
    /// A matching element was found and overwritten in place.
    Replaced,
    /// No element matched, so the value was pushed to the front.
    Inserted,
    /// No element matched and inserting was not requested; the value was
    /// dropped.
    NotFound,
}

struct Node<T> {
    entry: Mutex<Entry<T>>,
}

/// Everything a node's lock protects.
struct Entry<T> {
    value: T,
    next: Link<T>,
}

/// The owning pointer from a node (or the sentinel) to its successor.
///
/// Exactly one `Link` ever points at a given node. Nodes are moved between
/// links as raw pointers rather than `Box`es, since other threads may hold
/// references into a node while its owning link is rewritten.
struct Link<T>(Option<NonNull<Node<T>>>);

/// The lock held by a traversal on the last node it kept.
enum Cursor<'list, T: 'list> {
    Head(MutexGuard<'list, Link<T>>),
    Node(MutexGuard<'list, Entry<T>>),
}

/// What a traversal does with the node it has just locked.
enum Step<R> {
    /// Keep the node and move the cursor onto it.
    Continue,
    /// Splice the node out of the list and free it. The cursor stays put.
    Unlink,
    /// Stop traversing and return `R`.
    Break(R),
}

// === impl ConcurrentList ===

impl<T> ConcurrentList<T> {
    /// Returns a new, empty list.
    #[cfg(not(all(loom, test)))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: Mutex::new(Link::empty()),
        }
    }

    #[cfg(all(loom, test))]
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: Mutex::new(Link::empty()),
        }
    }

    /// Inserts `value` at the front of the list.
    ///
    /// The node is allocated before any lock is taken, and only the head's
    /// lock is held while it is linked in, so this never waits for a
    /// traversal that has already moved past the head.
    pub fn push_front(&self, value: T) {
        let node = Box::new(Node::new(value));
        let mut head = self.head.lock();
        test_println!("push_front: locked head");
        // the node is not reachable yet, so this lock is uncontended
        node.entry.lock().next = head.take();
        *head = Link::new(node);
    }

    /// Calls `visitor` with every element in the list, from front to back.
    ///
    /// See the [type-level documentation](ConcurrentList#consistency) for
    /// which elements a traversal racing with other operations will see.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&T),
    {
        self.traverse(|value| -> Step<()> {
            visitor(value);
            Step::Continue
        });
    }

    /// Calls a fallible `visitor` with every element in the list, from front
    /// to back, stopping at the first error.
    ///
    /// All locks are released before the error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use handover::ConcurrentList;
    ///
    /// let list: ConcurrentList<u32> = [1, 2, 3].into_iter().collect();
    ///
    /// let mut seen = Vec::new();
    /// let result = list.try_for_each(|&i| {
    ///     if i == 2 {
    ///         return Err("found a two");
    ///     }
    ///     seen.push(i);
    ///     Ok(())
    /// });
    ///
    /// assert_eq!(result, Err("found a two"));
    /// assert_eq!(seen, [3]);
    /// ```
    pub fn try_for_each<F, E>(&self, mut visitor: F) -> Result<(), E>
    where
        F: FnMut(&T) -> Result<(), E>,
    {
        self.traverse(|value| match visitor(value) {
            Ok(()) => Step::Continue,
            Err(error) => Step::Break(error),
        })
        .map_or(Ok(()), Err)
    }

    /// Returns a copy of the first element (from the front) matching
    /// `predicate`, or `None` if no element does.
    ///
    /// The copy is taken while the element's lock is held; the element
    /// itself may have changed by the time this returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use handover::ConcurrentList;
    ///
    /// let list: ConcurrentList<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// assert_eq!(list.find_first_if(|&i| i % 2 == 0), Some(4));
    /// assert_eq!(list.find_first_if(|&i| i > 10), None);
    /// ```
    pub fn find_first_if<F>(&self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
        T: Clone,
    {
        self.traverse(|value| {
            if predicate(value) {
                Step::Break(value.clone())
            } else {
                Step::Continue
            }
        })
    }

    /// Overwrites the first element matching `predicate` with `value`. If no
    /// element matches and `insert_if_missing` is true, pushes `value` to the
    /// front instead.
    ///
    /// # Upserts are not atomic
    ///
    /// The search and the insert are two separate operations: the traversal
    /// releases every lock before [`push_front`] is called. Two threads that
    /// concurrently miss on the same predicate will *both* insert their
    /// value, leaving duplicates in the list. Callers that need at most one
    /// matching element must coordinate those inserts themselves.
    ///
    /// # Examples
    ///
    /// ```
    /// use handover::{ConcurrentList, Update};
    ///
    /// let list = ConcurrentList::new();
    /// list.push_front(("apples", 1));
    ///
    /// let outcome = list.update_first_if(|&(k, _)| k == "apples", ("apples", 5), true);
    /// assert_eq!(outcome, Update::Replaced);
    ///
    /// let outcome = list.update_first_if(|&(k, _)| k == "pears", ("pears", 2), false);
    /// assert_eq!(outcome, Update::NotFound);
    ///
    /// let outcome = list.update_first_if(|&(k, _)| k == "pears", ("pears", 2), true);
    /// assert_eq!(outcome, Update::Inserted);
    ///
    /// assert_eq!(list.find_first_if(|&(k, _)| k == "apples"), Some(("apples", 5)));
    /// assert_eq!(list.len(), 2);
    /// ```
    ///
    /// [`push_front`]: ConcurrentList::push_front
    pub fn update_first_if<F>(&self, mut predicate: F, value: T, insert_if_missing: bool) -> Update
    where
        F: FnMut(&T) -> bool,
    {
        let mut value = Some(value);
        let replaced = self.traverse(|current| {
            if !predicate(current) {
                return Step::Continue;
            }

            if let Some(value) = value.take() {
                *current = value;
            }
            Step::Break(())
        });

        match (replaced, value) {
            (Some(()), _) => Update::Replaced,
            (None, Some(value)) if insert_if_missing => {
                test_println!("update_first_if: no match, inserting at front");
                self.push_front(value);
                Update::Inserted
            }
            (None, _) => Update::NotFound,
        }
    }

    /// Overwrites the first element matching `predicate` with `value`, or
    /// pushes `value` to the front if nothing matches.
    ///
    /// Equivalent to `update_first_if(predicate, value, true)`, and just as
    /// non-atomic: see [`update_first_if`].
    ///
    /// [`update_first_if`]: ConcurrentList::update_first_if
    #[inline]
    pub fn upsert<F>(&self, predicate: F, value: T) -> Update
    where
        F: FnMut(&T) -> bool,
    {
        self.update_first_if(predicate, value, true)
    }

    /// Removes every element matching `predicate`, returning how many were
    /// removed.
    ///
    /// This is a single pass from front to back. Removed elements are dropped
    /// while the lock of the node preceding them is held.
    ///
    /// # Examples
    ///
    /// ```
    /// use handover::ConcurrentList;
    ///
    /// let list: ConcurrentList<u32> = (0..10).collect();
    /// assert_eq!(list.remove_if(|i| i % 3 == 0), 4);
    ///
    /// let mut left = Vec::new();
    /// list.for_each(|&i| left.push(i));
    /// assert_eq!(left, [8, 7, 5, 4, 2, 1]);
    /// ```
    pub fn remove_if<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        self.traverse(|value| -> Step<()> {
            if predicate(value) {
                removed += 1;
                Step::Unlink
            } else {
                Step::Continue
            }
        });
        removed
    }

    /// Counts the elements in the list.
    ///
    /// This walks the whole list; when other threads are modifying it, the
    /// result is only an approximation.
    pub fn len(&self) -> usize {
        let mut len = 0;
        self.for_each(|_| len += 1);
        len
    }

    /// Returns `true` if the list currently holds no elements.
    ///
    /// Only the head's lock is taken.
    pub fn is_empty(&self) -> bool {
        self.head.lock().is_empty()
    }

    /// Walks the list with lock coupling, letting `step` decide what happens
    /// to each node.
    ///
    /// `step` is called with the element of the node just locked, while the
    /// lock of the last node kept (or the head) is still held.
    fn traverse<'list, R, F>(&'list self, mut step: F) -> Option<R>
    where
        T: 'list,
        F: FnMut(&mut T) -> Step<R>,
    {
        let mut cursor = Cursor::Head(self.head.lock());
        while let Some(mut next) = cursor.lock_next() {
            match step(&mut next.value) {
                Step::Continue => {
                    // `next` is already locked, so the old cursor is
                    // released only after it has been secured.
                    cursor = Cursor::Node(next);
                }
                Step::Unlink => {
                    test_println!("traverse: unlinking node");
                    let successor = next.next.take();
                    drop(next);
                    // The node's own lock is released, but nobody else can
                    // reach it without the cursor's lock.
                    let unlinked = cursor.next_link().replace(successor);
                    drop(unlinked);
                }
                Step::Break(result) => {
                    test_println!("traverse: stopping early");
                    return Some(result);
                }
            }
        }

        test_println!("traverse: reached the tail");
        None
    }
}

impl<T> Default for ConcurrentList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ConcurrentList<T> {
    fn drop(&mut self) {
        let _freed = test_dbg!(self.remove_if(|_| true));
    }
}

impl<T> Extend<T> for ConcurrentList<T> {
    /// Pushes every item to the front, so they end up in reverse order.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_front(value);
        }
    }
}

impl<T> FromIterator<T> for ConcurrentList<T> {
    /// Collects a list reading in *reverse* iteration order.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<T: fmt::Debug> fmt::Debug for ConcurrentList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        self.for_each(|value| {
            list.entry(value);
        });
        list.finish()
    }
}

// === impl Node ===

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            entry: Mutex::new(Entry {
                value,
                next: Link::empty(),
            }),
        }
    }
}

// === impl Link ===

impl<T> Link<T> {
    const fn empty() -> Self {
        Self(None)
    }

    fn new(node: Box<Node<T>>) -> Self {
        Self(Some(NonNull::from(Box::leak(node))))
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    #[inline]
    fn take(&mut self) -> Self {
        Self(self.0.take())
    }

    #[inline]
    fn replace(&mut self, link: Self) -> Self {
        mem::replace(self, link)
    }
}

impl<T> Drop for Link<T> {
    fn drop(&mut self) {
        if let Some(node) = self.0.take() {
            // Safety: a `Link` is the sole owner of the node it points to, and
            // it was created from a `Box` in `Link::new`.
            drop(unsafe { Box::from_raw(node.as_ptr()) });
        }
    }
}

// Safety: a `Link` owns its node like a `Box<Node<T>>` would, and the node's
// contents are only reachable through its lock.
unsafe impl<T: Send> Send for Link<T> {}

// === impl Cursor ===

impl<'list, T: 'list> Cursor<'list, T> {
    fn next_link(&mut self) -> &mut Link<T> {
        match self {
            Cursor::Head(head) => &mut **head,
            Cursor::Node(entry) => &mut entry.next,
        }
    }

    /// Locks the node after the cursor, if there is one.
    ///
    /// The cursor's own lock is left untouched; it is up to the caller to
    /// release it once the returned guard is in hand.
    fn lock_next(&self) -> Option<MutexGuard<'list, Entry<T>>> {
        let link: &Link<T> = match self {
            Cursor::Head(head) => &**head,
            Cursor::Node(entry) => &entry.next,
        };
        let next = link.0?;

        // Safety: a node is only freed by a thread holding both the lock on
        // the link that owns it and the node's own lock. We hold the owning
        // link's lock here, so the node is alive while we acquire its lock,
        // and once we hold that lock nobody can free it until we release it,
        // whether or not the cursor is still held by then.
        let node: &'list Node<T> = unsafe { next.as_ref() };
        Some(node.entry.lock())
    }
}
