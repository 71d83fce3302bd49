use crate::*;

use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::mem::{size_of, MaybeUninit};



const FOOTER_SIZE      : usize     = size_of::<usize>();
const FOOTER_ALIGNMENT : Alignment = Alignment::WORD;

/// LIFO-allocate from a caller-supplied region
///
/// Each block carries a trailing footer word recording how many bytes the
/// block consumed, measured from the end of the block below it.  Freeing
/// reads the top footer, checks the freed pointer really is the top block,
/// and rewinds - so only the most recent un-freed block can be released.
///
/// Block layout: `[.. aligned payload .. | distance to previous block end]`,
/// the footer itself word-aligned.
///
/// *   `malloc` and `free` are O(1); zero-byte requests fail with [`Failure::ZeroSize`]
/// *   `free` of anything but the top block fails with [`Failure::LifoViolation`]
/// *   `free` on an empty stack fails with [`Failure::DoubleFree`]
///
/// Identity tag: [`Kind::Stack`] (4).  The alignment is clamped up to at
/// least [`Alignment::WORD`] so footers stay aligned.
pub struct Stack<'a> {
    region:    Region<'a>,
    block_end: Cell<usize>, // end of the top block (past its footer); aligned_base when empty
    valid:     bool,
}

impl<'a> Stack<'a> {
    /// Construct over `buffer` with word alignment.
    pub fn new(buffer: &'a mut [MaybeUninit<u8>]) -> Self { Self::with_alignment(buffer, Alignment::WORD) }

    /// Construct over `buffer`; every returned address will be a multiple of
    /// `max(alignment, Alignment::WORD)`.
    pub fn with_alignment(buffer: &'a mut [MaybeUninit<u8>], alignment: Alignment) -> Self {
        let alignment = alignment.max(Alignment::WORD);
        let region = Region::new(buffer, alignment);
        let valid = FOOTER_SIZE <= region.size();
        let block_end = Cell::new(region.aligned_base());
        dout!("HELLO:: stack memory resource");
        dout!("* final alignment is {} bytes, size is {} bytes", alignment.as_usize(), region.size());
        if !valid {
            dout!("* error:: memory does not satisfy minimal size requirements !!!");
            let _ = raise(Failure::InvalidConstruction);
        }
        Self { region, block_end, valid }
    }

    pub fn from_array<const N: usize>(array: &'a mut MaybeUninit<[MaybeUninit<u8>; N]>) -> Self {
        // SAFETY: ✔️ an array of `MaybeUninit<u8>` is always "init", whatever its bytes
        let array : &mut [MaybeUninit<u8>; N] = unsafe { array.assume_init_mut() };
        Self::new(&mut array[..])
    }

    pub fn start_aligned_address(&self) -> usize { self.region.aligned_base() }
    pub fn end_aligned_address  (&self) -> usize { self.region.aligned_end() }
}

impl Debug for Stack<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Stack {{ blocks (LIFO): [")?;
        let root = self.start_aligned_address();
        let mut head = self.block_end.get();
        let mut first = true;
        while head > root {
            // SAFETY: ✔️ a non-empty stack keeps a footer just below each block end; all of them live inside the region
            let distance = unsafe { self.region.load_word(head - FOOTER_SIZE) };
            if !first { write!(f, " <- ")? }
            write!(f, "{distance}")?;
            first = false;
            if distance == 0 || distance > head - root { break } // corrupt footer, stop walking
            head -= distance;
        }
        write!(f, "], available: {} }}", self.available_size())
    }
}

// SAFETY: ✔️ malloc hands out `[align_up(top), footer)` ranges above every live block, so allocations are disjoint and aligned; free only ever rewinds to a previously recorded block end
unsafe impl<'a> Resource for Stack<'a> {
    fn kind(&self) -> Kind { Kind::Stack }
    fn alignment(&self) -> Alignment { self.region.alignment() }
    fn region_base(&self) -> Option<usize> { Some(self.region.base_address()) }
    fn is_valid(&self) -> bool { self.valid }

    fn available_size(&self) -> usize {
        self.region.aligned_end().saturating_sub(self.alignment().align_up(self.block_end.get()))
    }

    fn malloc(&self, size_bytes: usize) -> Result<AllocNN, Failure> {
        dout!("MALLOC:: stack memory\n- requested {size_bytes} bytes");
        if !self.valid { return Err(raise(Failure::InvalidConstruction)) }
        if size_bytes == 0 { return Err(raise(Failure::ZeroSize)) }

        let prev_block_end  = self.block_end.get();
        let new_block_start = self.alignment().align_up(prev_block_end);
        let Some(aligned_size) = self.alignment().checked_align_up(size_bytes) else { return Err(raise(Failure::OutOfMemory)) };
        let Some(footer_start)  = new_block_start.checked_add(FOOTER_ALIGNMENT.align_up(aligned_size)) else { return Err(raise(Failure::OutOfMemory)) };
        let Some(new_block_end) = footer_start.checked_add(FOOTER_SIZE) else { return Err(raise(Failure::OutOfMemory)) };
        // what this block costs, footer and realignment included
        let distance = new_block_end - prev_block_end;

        if distance > self.available_size() {
            dout!("- no free space available {}\n- tried to allocate {distance} bytes", self.available_size());
            return Err(raise(Failure::OutOfMemory));
        }

        self.block_end.set(new_block_end);
        // SAFETY: ✔️ `footer_start + FOOTER_SIZE <= aligned_end` per the capacity check; block start and size are multiples of the word-sized-or-larger engine alignment, so `footer_start` is word-aligned
        unsafe { self.region.store_word(footer_start, distance) };
        dout!("- handed a free block @{new_block_start:#x}\n- allocated {distance} bytes");
        // SAFETY: ✔️ `new_block_start` is in-region per the capacity check, and region addresses are nonzero
        Ok(unsafe { AllocNN::new_unchecked(self.region.ptr_at(new_block_start).cast()) })
    }

    unsafe fn free(&self, ptr: AllocNN) -> Result<(), Failure> {
        let address = ptr.as_ptr() as usize;
        dout!("FREE:: stack allocator\n- free a block address @{address:#x}");
        if !self.valid { return Err(raise(Failure::InvalidConstruction)) }
        if self.block_end.get() == self.start_aligned_address() {
            dout!("- error: nothing was allocated, nothing to free");
            return Err(raise(Failure::DoubleFree));
        }

        let block_end = self.block_end.get();
        // SAFETY: ✔️ a non-empty stack wrote this footer in `malloc`; it is in-region and word-aligned
        let distance = unsafe { self.region.load_word(block_end - FOOTER_SIZE) };
        let prev_block_end  = block_end - distance;
        let top_block_start = self.alignment().align_up(prev_block_end);
        if address != top_block_start {
            dout!("- error: proposed free block is not the latest allocated, and thus violating the LIFO property !!!");
            return Err(raise(Failure::LifoViolation));
        }
        self.block_end.set(prev_block_end);
        Ok(())
    }
}



#[test] fn contract_alignment() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    resource::test::alignment(&Stack::from_array(&mut buffer));
}

#[test] fn contract_round_trip() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    resource::test::round_trip(&Stack::from_array(&mut buffer), 100);
}

#[test] fn lifo_discipline() {
    // an allocation the size of the whole buffer can't also fit its footer
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 5000]> = MaybeUninit::uninit();
    let memory = Stack::from_array(&mut buffer);
    assert_eq!(Err(Failure::OutOfMemory), memory.malloc(5000));

    let a = memory.malloc(512).unwrap();
    let b = memory.malloc(256).unwrap();
    assert_eq!(Err(Failure::LifoViolation), unsafe { memory.free(a) });
    unsafe { memory.free(b) }.unwrap();
    unsafe { memory.free(a) }.unwrap();
    assert_eq!(Err(Failure::DoubleFree), unsafe { memory.free(a) });
}

#[test] fn only_top_block_frees() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Stack::from_array(&mut buffer);
    let a = memory.malloc(64).unwrap();
    let b = memory.malloc(64).unwrap();
    let c = memory.malloc(64).unwrap();
    assert_eq!(Err(Failure::LifoViolation), unsafe { memory.free(a) });
    assert_eq!(Err(Failure::LifoViolation), unsafe { memory.free(b) });
    for p in [c, b, a] { unsafe { memory.free(p) }.unwrap() }
    assert_eq!(memory.available_size(), memory.end_aligned_address() - memory.start_aligned_address());
}

#[test] fn zero_size_fails() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 128]> = MaybeUninit::uninit();
    let memory = Stack::from_array(&mut buffer);
    assert_eq!(Err(Failure::ZeroSize), memory.malloc(0));
}

#[test] fn foreign_pointer_is_a_lifo_violation() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let memory = Stack::from_array(&mut buffer);
    let a = memory.malloc(32).unwrap();
    let bogus = unsafe { AllocNN::new_unchecked(a.as_ptr().add(8)) };
    assert_eq!(Err(Failure::LifoViolation), unsafe { memory.free(bogus) });
    unsafe { memory.free(a) }.unwrap();
}

#[test] fn too_small_region_is_invalid() {
    let mut tiny = [MaybeUninit::new(0u8); 4];
    let memory = Stack::new(&mut tiny[..core::mem::size_of::<usize>().min(4) - 1]);
    assert!(!memory.is_valid());
    assert_eq!(Err(Failure::InvalidConstruction), memory.malloc(1));
}

#[test] fn equality_is_by_region() {
    let mut a : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let mut b : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let ra = Stack::from_array(&mut a);
    let rb = Stack::from_array(&mut b);
    assert!(ra.is_equal(&ra));
    resource::test::distinct(&ra, &rb);
}
