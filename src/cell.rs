//! A manually managed payload cell.

use core::mem::MaybeUninit;

/// A properly sized and aligned region for one `T` with explicit
/// construction and destruction.
///
/// The cell never tracks whether it holds a live value; the surrounding
/// slot metadata does. Reading or dropping a cell that was never written is
/// undefined behavior, so every accessor is `unsafe` and callers must gate
/// them on that metadata.
pub(crate) struct RawCell<T> {
    buf: MaybeUninit<T>,
}

impl<T> RawCell<T> {
    #[inline(always)]
    pub(crate) const fn empty() -> Self {
        RawCell {
            buf: MaybeUninit::uninit(),
        }
    }

    /// Constructs a value in the cell. Any previous live value must have
    /// been read or dropped first.
    #[inline(always)]
    pub(crate) fn write(&mut self, value: T) {
        self.buf.write(value);
    }

    /// # Safety
    ///
    /// The cell must hold a live value.
    #[inline(always)]
    pub(crate) unsafe fn get(&self) -> &T {
        // SAFETY: the caller guarantees the cell was written.
        unsafe { self.buf.assume_init_ref() }
    }

    /// # Safety
    ///
    /// The cell must hold a live value.
    #[inline(always)]
    pub(crate) unsafe fn get_mut(&mut self) -> &mut T {
        // SAFETY: the caller guarantees the cell was written.
        unsafe { self.buf.assume_init_mut() }
    }

    /// Moves the value out, leaving the cell logically empty.
    ///
    /// # Safety
    ///
    /// The cell must hold a live value, and the caller must not read or
    /// drop it again.
    #[inline(always)]
    pub(crate) unsafe fn read(&self) -> T {
        // SAFETY: the caller guarantees the cell was written and takes
        // ownership of the value.
        unsafe { self.buf.assume_init_read() }
    }

    /// Drops the value in place.
    ///
    /// # Safety
    ///
    /// The cell must hold a live value, and the caller must not read or
    /// drop it again.
    #[inline(always)]
    pub(crate) unsafe fn drop_in_place(&mut self) {
        // SAFETY: the caller guarantees the cell was written exactly once
        // since the last release.
        unsafe { self.buf.assume_init_drop() }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use core::mem;

    use super::*;

    #[test]
    fn cell_adds_no_size() {
        assert_eq!(mem::size_of::<RawCell<String>>(), mem::size_of::<String>());
        assert_eq!(mem::size_of::<RawCell<u32>>(), mem::size_of::<u32>());
        assert_eq!(mem::align_of::<RawCell<u64>>(), mem::align_of::<u64>());
    }

    #[test]
    fn string_lifecycle() {
        let mut cell = RawCell::empty();
        cell.write(String::from("foobar"));
        unsafe {
            assert_eq!(cell.get().as_str(), "foobar");
            cell.get_mut().push('!');
            assert_eq!(cell.get().as_str(), "foobar!");
            cell.drop_in_place();
        }
    }

    #[test]
    fn read_moves_the_value_out() {
        let mut cell = RawCell::empty();
        cell.write(alloc::vec![1, 2, 3]);
        let taken: alloc::vec::Vec<i32> = unsafe { cell.read() };
        assert_eq!(taken, [1, 2, 3]);

        cell.write(alloc::vec![4]);
        unsafe {
            assert_eq!(*cell.get(), [4]);
            cell.drop_in_place();
        }
    }
}
