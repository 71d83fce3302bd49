//! [`Resource`] - the runtime-polymorphic contract every engine implements

use crate::*;



/// One-byte engine identity, used exclusively by [`Resource::is_equal`]
///
/// | Tag | Engine                            |
/// | ----| ----------------------------------|
/// | 0   | `allocator::c::Malloc`            |
/// | 1   | `allocator::linear::Linear`       |
/// | 2   | `allocator::dynamic::Dynamic`     |
/// | 3   | `allocator::pool::Pool`           |
/// | 4   | `allocator::stack::Stack`         |
/// | 5   | `allocator::debug::Void`          |
/// | 6   | `allocator::debug::Throw`         |
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)] #[repr(u8)] pub enum Kind {
    Std     = 0,
    Linear  = 1,
    Dynamic = 2,
    Pool    = 3,
    Stack   = 4,
    Void    = 5,
    Throw   = 6,
}

/// A memory resource: raw `malloc`/`free` plus enough identity to tell
/// whether two resources are interchangeable.
///
/// Engines are used directly or through `&dyn Resource` (the
/// [`TypedAlloc`] facade does the latter).
///
/// ## Safety
/// Implementations promise:
/// *   A successful [`malloc`](Self::malloc) returns an address that is a multiple of [`alignment`](Self::alignment), valid for at least `size_bytes` bytes, and disjoint from every other live allocation of this resource.
/// *   Returned memory stays valid until it is freed through this resource (or an [`is_equal`](Self::is_equal) one), or the resource is dropped, whichever comes first.
pub unsafe trait Resource {
    /// The engine identity tag.
    fn kind(&self) -> Kind;

    /// The alignment every returned address is a multiple of.
    fn alignment(&self) -> Alignment;

    /// `false` iff construction failed; an invalid resource refuses every
    /// operation with [`Failure::InvalidConstruction`].
    fn is_valid(&self) -> bool { true }

    /// A non-binding estimate of how many more bytes can be handed out.
    fn available_size(&self) -> usize;

    /// Allocate at least `size_bytes` bytes.
    fn malloc(&self, size_bytes: usize) -> Result<AllocNN, Failure>;

    /// Release `ptr` back to the resource.
    ///
    /// ### Safety
    /// *   `ptr` must have been returned by [`malloc`](Self::malloc) on this resource (or an [`is_equal`](Self::is_equal) one).  Engines detect *some* misuse, per their docs, but none promise to catch everything.
    /// *   `ptr` must not be accessed after a successful free.
    unsafe fn free(&self, ptr: AllocNN) -> Result<(), Failure>;

    /// Base address of the backing region, if the resource has one.
    /// [`None`] for region-less resources (the C heap pass-through, test doubles).
    fn region_base(&self) -> Option<usize> { None }

    /// Two resources compare equal iff memory returned by one may be
    /// released through the other: same engine [`kind`](Self::kind) over the
    /// same region.
    fn is_equal(&self, other: &dyn Resource) -> bool { self.kind() == other.kind() && self.region_base() == other.region_base() }
}

impl<'r> PartialEq for dyn Resource + 'r {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self as *const _ as *const (), other as *const _ as *const ()) || self.is_equal(other)
    }
}



/// Checks a [`Resource`] implementation through its contract alone.
pub mod test {
    use super::*;

    /// Assert that every successful allocation is aligned to the resource alignment.
    pub fn alignment(resource: &dyn Resource) {
        let align = resource.alignment().as_usize();
        for size in [1, 2, 3, 8, 17, 32, 100, 1000] {
            let Ok(alloc) = resource.malloc(size) else { continue };
            let address = alloc.as_ptr() as usize;
            assert_eq!(0, address % align, "allocation of {size} bytes @ {address:#x} has less than the promised alignment");
            // SAFETY: ✔️ `alloc` was just returned by this resource (some engines still refuse per-block frees; that's fine here)
            let _ = unsafe { resource.free(alloc) };
        }
    }

    /// Assert that a malloc/free round trip restores `available_size`.
    /// Only meaningful for engines with per-block reclamation.
    pub fn round_trip(resource: &dyn Resource, size: usize) {
        let before = resource.available_size();
        let alloc = resource.malloc(size).expect("round_trip: malloc failed");
        assert!(resource.available_size() < before, "round_trip: malloc did not consume anything");
        // SAFETY: ✔️ `alloc` was just returned by this resource
        unsafe { resource.free(alloc) }.expect("round_trip: free failed");
        assert_eq!(before, resource.available_size());
    }

    /// Assert that `a` and `b` are not interchangeable, in both directions.
    pub fn distinct(a: &dyn Resource, b: &dyn Resource) {
        assert!(!a.is_equal(b));
        assert!(!b.is_equal(a));
    }
}
