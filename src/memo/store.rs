use std::fmt::{Debug, Formatter};

use itertools::Itertools;

/// Used by [memo](crate::memo::Memo) to store expressions. This data structure stores its data
/// at pages of equal size and allows access to them via [opaque identifiers](self::StoreElementId).
/// Elements are never removed or moved between pages, so identifiers stay valid for the lifetime of the store.
pub struct Store<T> {
    page_size: usize,
    len: usize,
    pages: Vec<Vec<T>>,
}

impl<T> Store<T> {
    /// Creates a new store with the given number of elements per page.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is zero.
    pub fn new(page_size: usize) -> Self {
        assert_ne!(page_size, 0, "Page size must be positive");
        Store {
            page_size,
            len: 0,
            pages: Vec::with_capacity(16),
        }
    }

    /// Inserts the given element to this storage and returns its [identifier](self::StoreElementId).
    pub fn insert(&mut self, elem: T) -> StoreElementId {
        let elem_id = self.next_id();
        match self.pages.last_mut() {
            Some(page) if page.len() < self.page_size => page.push(elem),
            _ => {
                let mut page = Vec::with_capacity(self.page_size);
                page.push(elem);
                self.pages.push(page);
            }
        }
        self.len += 1;
        elem_id
    }

    /// Returns a reference to an element with the given id.
    pub fn get(&self, elem_id: StoreElementId) -> Option<&T> {
        let (page_idx, elem_idx) = self.to_page_index(elem_id);
        self.pages.get(page_idx).and_then(|p| p.get(elem_idx))
    }

    /// Returns a mutable reference to an element with the given id.
    pub fn get_mut(&mut self, elem_id: StoreElementId) -> Option<&mut T> {
        let (page_idx, elem_idx) = self.to_page_index(elem_id);
        self.pages.get_mut(page_idx).and_then(|p| p.get_mut(elem_idx))
    }

    /// Returns the number of elements in the store.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if this store has no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of allocated pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Returns the identifier that will be assigned to the next element.
    pub fn next_id(&self) -> StoreElementId {
        StoreElementId(self.len)
    }

    /// Returns the number of bytes used by allocated pages.
    pub fn allocated_bytes(&self) -> usize {
        self.pages.len() * self.page_size * std::mem::size_of::<T>()
    }

    /// Returns an iterator over elements of this store.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.pages.iter().flat_map(|p| p.iter())
    }

    fn to_page_index(&self, elem_id: StoreElementId) -> (usize, usize) {
        let page_idx = elem_id.0 / self.page_size;
        let elem_idx = elem_id.0 % self.page_size;

        (page_idx, elem_idx)
    }
}

impl<T> Debug for Store<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        f.write_str(self.iter().map(|r| format!("{:?}", r)).join(", ").as_str())?;
        f.write_str("]")
    }
}

/// An identifier of an element in a store.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StoreElementId(pub usize);

impl StoreElementId {
    pub fn index(&self) -> usize {
        self.0
    }
}
