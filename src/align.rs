use crate::util;

use core::fmt::{self, Debug, Formatter};
use core::mem::align_of;
use core::num::{NonZeroUsize, TryFromIntError};



/// A power-of-two alignment, in bytes
///
/// Every address an engine hands out is a multiple of its `Alignment`.  All
/// engines but the linear one clamp their alignment up to at least
/// [`Alignment::WORD`] so their pointer-wide metadata words stay aligned.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)] #[repr(transparent)] pub struct Alignment(NonZeroUsize);
const _ : () = assert!(align_of::<Alignment>() == align_of::<usize>());
const _ : () = assert!(core::mem::size_of::<Alignment>() == core::mem::size_of::<usize>());

impl Alignment {
    /// Returns [`None`] unless `align` is a valid power of 2 (which also implies nonzero)
    pub const fn new(align: usize) -> Option<Self> {
        if align.is_power_of_two() {
            // SAFETY: ✔️ a power of two is nonzero
            Some(Self(unsafe { NonZeroUsize::new_unchecked(align) }))
        } else {
            None
        }
    }

    /// **Undefined behavior** unless `align` is a valid power of 2 (which also implies nonzero)
    pub const unsafe fn new_unchecked(align: usize) -> Self {
        // SAFETY: ✔️ caller promises `align` is a power of two, ergo nonzero
        Self(unsafe { NonZeroUsize::new_unchecked(align) })
    }

    /// Returns the [`Alignment`] of `T`.
    pub const fn of<T>() -> Self {
        // SAFETY: ✔️ `align_of` is always a power of two
        unsafe { Self::new_unchecked(align_of::<T>()) }
    }

    /// Returns the alignment as a [`usize`]
    pub const fn as_usize  (self) -> usize        { self.0.get() }

    /// Returns the alignment as a [`NonZeroUsize`]
    pub const fn as_nonzero(self) -> NonZeroUsize { self.0 }

    /// Minimum representable alignment (`1`)
    pub const MIN  : Alignment = match Alignment::new(1) { Some(a) => a, None => unreachable!() };

    /// The alignment of a pointer-wide word; the floor for every engine but the linear one
    pub const WORD : Alignment = Alignment::of::<usize>();

    /// `address`, rounded up to the next multiple of `self` (wrapping near [`usize::MAX`])
    pub const fn align_up  (self, address: usize) -> usize { let mask = self.as_usize() - 1; address.wrapping_add(mask) & !mask }

    /// `address`, rounded down to the previous multiple of `self`
    pub const fn align_down(self, address: usize) -> usize { address & !(self.as_usize() - 1) }

    /// [`align_up`](Self::align_up), refusing to wrap past [`usize::MAX`]
    pub const fn checked_align_up(self, address: usize) -> Option<usize> {
        let aligned = self.align_up(address);
        if aligned < address { None } else { Some(aligned) }
    }

    /// Is `address` a multiple of `self`?
    pub const fn is_aligned(self, address: usize) -> bool { self.align_down(address) == address }

    /// The larger of the two alignments
    pub const fn max(self, other: Alignment) -> Alignment { if other.as_usize() > self.as_usize() { other } else { self } }
}

impl From<Alignment> for usize          { fn from(align: Alignment) -> Self { align.as_usize()   } }
impl From<Alignment> for NonZeroUsize   { fn from(align: Alignment) -> Self { align.as_nonzero() } }

impl TryFrom<usize> for Alignment {
    type Error = TryFromIntError;
    fn try_from(align: usize) -> Result<Self, Self::Error> { Self::new(align).ok_or_else(|| NonZeroUsize::try_from(0usize).unwrap_err()) }
}

impl Debug for Alignment { fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { util::bytes::pretty(f, self.as_usize()) } }



#[test] fn new_rejects_non_powers() {
    for bad in [0usize, 3, 6, 7, 12, usize::MAX] { assert!(Alignment::new(bad).is_none(), "{bad} accepted") }
    for good in [1usize, 2, 4, 8, 4096] { assert_eq!(good, Alignment::new(good).unwrap().as_usize()) }
}

#[test] fn rounding() {
    let a = Alignment::new(8).unwrap();
    assert_eq!(0,  a.align_up(0));
    assert_eq!(8,  a.align_up(1));
    assert_eq!(8,  a.align_up(8));
    assert_eq!(16, a.align_up(9));
    assert_eq!(0,  a.align_down(7));
    assert_eq!(8,  a.align_down(15));
    assert!(a.is_aligned(0) && a.is_aligned(64) && !a.is_aligned(4));
    assert_eq!(None, a.checked_align_up(usize::MAX - 3));
}
