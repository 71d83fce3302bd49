use crate::*;

use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::mem::MaybeUninit;



/// Bump-allocate from a caller-supplied region
///
/// Memory is handed out by advancing a cursor; nothing is reclaimed
/// per-block.  [`reset`](Self::reset) snaps the cursor back to the start and
/// implicitly reclaims everything at once.
///
/// *   `malloc` is O(1); zero-byte requests fail with [`Failure::ZeroSize`]
/// *   `free` always fails ([`Failure::NotABlock`]); there are no blocks to free
///
/// Identity tag: [`Kind::Linear`] (1).
pub struct Linear<'a> {
    region:  Region<'a>,
    current: Cell<usize>,
}

impl<'a> Linear<'a> {
    /// Construct over `buffer` with word alignment.
    pub fn new(buffer: &'a mut [MaybeUninit<u8>]) -> Self { Self::with_alignment(buffer, Alignment::WORD) }

    /// Construct over `buffer`; every returned address will be a multiple of `alignment`.
    pub fn with_alignment(buffer: &'a mut [MaybeUninit<u8>], alignment: Alignment) -> Self {
        let region = Region::new(buffer, alignment);
        let current = Cell::new(region.aligned_base());
        dout!("HELLO:: linear memory resource");
        dout!("* requested alignment is {} bytes, size is {} bytes", alignment.as_usize(), region.size());
        Self { region, current }
    }

    pub fn from_array<const N: usize>(array: &'a mut MaybeUninit<[MaybeUninit<u8>; N]>) -> Self {
        // SAFETY: ✔️ an array of `MaybeUninit<u8>` is always "init", whatever its bytes
        let array : &mut [MaybeUninit<u8>; N] = unsafe { array.assume_init_mut() };
        Self::new(&mut array[..])
    }

    /// Snap the cursor back to the start; every previous allocation is
    /// implicitly reclaimed (and must no longer be used).
    pub fn reset(&self) {
        self.current.set(self.region.aligned_base());
        dout!("RESET:: linear memory\n- reset memory to start @ {:#x} (aligned up)", self.current.get());
    }

    pub fn start_aligned_address(&self) -> usize { self.region.aligned_base() }
    pub fn end_aligned_address  (&self) -> usize { self.region.aligned_end() }
}

impl Debug for Linear<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Linear {{ available: {}/{} }}", self.available_size(), self.region.aligned_span())
    }
}

// SAFETY: ✔️ malloc hands out disjoint `[cursor, cursor + aligned size)` ranges of the exclusively borrowed region; the cursor starts aligned and advances by aligned amounts, and never rewinds except via `reset`
unsafe impl<'a> Resource for Linear<'a> {
    fn kind(&self) -> Kind { Kind::Linear }
    fn alignment(&self) -> Alignment { self.region.alignment() }
    fn available_size(&self) -> usize { self.region.aligned_end().saturating_sub(self.current.get()) }
    fn region_base(&self) -> Option<usize> { Some(self.region.base_address()) }

    fn malloc(&self, size_bytes: usize) -> Result<AllocNN, Failure> {
        let Some(size_bytes) = self.alignment().checked_align_up(size_bytes) else { return Err(raise(Failure::OutOfMemory)) };
        dout!("MALLOC:: linear allocator\n- request a block of size {size_bytes} (aligned up)");
        if size_bytes == 0 {
            dout!("- error, cannot fulfill a size 0 bytes block !!");
            return Err(raise(Failure::ZeroSize));
        }
        if size_bytes > self.available_size() {
            dout!("- error, could not fulfill this size\n- available size is {}", self.available_size());
            return Err(raise(Failure::OutOfMemory));
        }
        let address = self.current.get();
        self.current.set(address + size_bytes);
        // SAFETY: ✔️ `address + size_bytes <= aligned_end` was checked above, and region addresses are nonzero
        Ok(unsafe { AllocNN::new_unchecked(self.region.ptr_at(address).cast()) })
    }

    unsafe fn free(&self, _ptr: AllocNN) -> Result<(), Failure> {
        dout!("FREE:: linear allocator\n- linear allocator does not free space, use reset() instead");
        Err(raise(Failure::NotABlock))
    }
}



#[test] fn contract_alignment() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    resource::test::alignment(&Linear::from_array(&mut buffer));
}

#[test] fn bumps_forward_and_contains() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Linear::from_array(&mut buffer);
    let a = memory.malloc(10).unwrap().as_ptr() as usize;
    let b = memory.malloc(10).unwrap().as_ptr() as usize;
    assert!(a < b);
    assert!(a >= memory.start_aligned_address());
    assert!(b + 10 <= memory.end_aligned_address());
}

#[test] fn zero_size_fails() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let memory = Linear::from_array(&mut buffer);
    assert_eq!(Err(Failure::ZeroSize), memory.malloc(0));
}

#[test] fn exhausts_then_fails() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 128]> = MaybeUninit::uninit();
    let memory = Linear::from_array(&mut buffer);
    while memory.malloc(16).is_ok() {}
    assert_eq!(Err(Failure::OutOfMemory), memory.malloc(16));
    assert!(memory.available_size() < 16);
}

#[test] fn free_always_fails() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let memory = Linear::from_array(&mut buffer);
    let a = memory.malloc(8).unwrap();
    assert_eq!(Err(Failure::NotABlock), unsafe { memory.free(a) });
}

#[test] fn reset_restores_everything() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let memory = Linear::from_array(&mut buffer);
    let span = memory.available_size();
    memory.malloc(32).unwrap();
    memory.malloc(32).unwrap();
    assert!(memory.available_size() < span);
    memory.reset();
    assert_eq!(span, memory.available_size());
    assert_eq!(span, memory.end_aligned_address() - memory.start_aligned_address());
}

#[test] fn equality_is_by_region() {
    let mut a : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let mut b : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let ra = Linear::from_array(&mut a);
    let rb = Linear::from_array(&mut b);
    assert!(ra.is_equal(&ra));
    resource::test::distinct(&ra, &rb);
}
