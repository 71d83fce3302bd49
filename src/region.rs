//! [`Region`] - the one place raw addresses and pointers convert into each other

use crate::*;

use core::marker::PhantomData;
use core::mem::{size_of, MaybeUninit};
use core::ptr::NonNull;



/// A caller-supplied byte region `[base, base + size)`, borrowed for `'a`.
///
/// Engines do their bookkeeping in plain `usize` addresses; every conversion
/// back to a pointer funnels through [`ptr_at`](Self::ptr_at), and every
/// metadata word access through [`load_word`](Self::load_word) /
/// [`store_word`](Self::store_word), which debug-assert the invariants the
/// callers must uphold: the access stays inside the region and word accesses
/// are word-aligned.
///
/// The region is exclusively borrowed for `'a`, so writes through `base`
/// cannot alias caller data, and pointers derived from `base` keep its
/// provenance.
pub(crate) struct Region<'a> {
    base:       NonNull<MaybeUninit<u8>>,
    size:       usize,
    alignment:  Alignment,
    _buffer:    PhantomData<&'a mut [MaybeUninit<u8>]>,
}

impl<'a> Region<'a> {
    pub fn new(buffer: &'a mut [MaybeUninit<u8>], alignment: Alignment) -> Self {
        // SAFETY: ✔️ slice data pointers are never null
        let base = unsafe { NonNull::new_unchecked(buffer.as_mut_ptr()) };
        Self { base, size: buffer.len(), alignment, _buffer: PhantomData }
    }

    pub fn base_address(&self) -> usize     { self.base.as_ptr() as usize }
    pub fn size        (&self) -> usize     { self.size }
    pub fn alignment   (&self) -> Alignment { self.alignment }

    /// First address in the region that is a multiple of the engine alignment.
    pub fn aligned_base(&self) -> usize { self.alignment.align_up(self.base_address()) }

    /// One past the last usable aligned address: `align_down(base + size)`.
    pub fn aligned_end(&self) -> usize { self.alignment.align_down(self.base_address() + self.size) }

    /// `aligned_end - aligned_base`, clamped to zero for regions too small to
    /// contain even one aligned address.
    pub fn aligned_span(&self) -> usize { self.aligned_end().saturating_sub(self.aligned_base()) }

    /// Reify `address` as a pointer into the region (one-past-the-end allowed).
    pub fn ptr_at(&self, address: usize) -> *mut u8 {
        debug_assert!(address >= self.base_address() && address <= self.base_address() + self.size, "address {address:#x} escapes the region");
        // SAFETY: ✔️ `address - base` is within the borrowed buffer per the assert above, so the offset pointer keeps `base`'s provenance
        unsafe { self.base.as_ptr().cast::<u8>().add(address - self.base_address()) }
    }

    /// Read the metadata word at `address`.
    ///
    /// ### Safety
    /// *   `address .. address + size_of::<usize>()` must lie inside the region
    /// *   `address` must be word-aligned
    pub unsafe fn load_word(&self, address: usize) -> usize {
        debug_assert!(Alignment::WORD.is_aligned(address), "word access @ {address:#x} is misaligned");
        debug_assert!(address + size_of::<usize>() <= self.base_address() + self.size, "word access @ {address:#x} escapes the region");
        // SAFETY: ✔️ in-region and word-aligned per the fn preconditions
        unsafe { self.ptr_at(address).cast::<usize>().read() }
    }

    /// Write the metadata word at `address`.
    ///
    /// ### Safety
    /// Same preconditions as [`load_word`](Self::load_word).
    pub unsafe fn store_word(&self, address: usize, word: usize) {
        debug_assert!(Alignment::WORD.is_aligned(address), "word access @ {address:#x} is misaligned");
        debug_assert!(address + size_of::<usize>() <= self.base_address() + self.size, "word access @ {address:#x} escapes the region");
        // SAFETY: ✔️ in-region and word-aligned per the fn preconditions; the region is exclusively ours for `'a`
        unsafe { self.ptr_at(address).cast::<usize>().write(word) }
    }
}
