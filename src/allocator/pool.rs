use crate::*;

use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::mem::{size_of, MaybeUninit};



/// Fixed-size-slot allocate from a caller-supplied region
///
/// The region is cut into equal slots; a free list threads through the unused
/// ones by borrowing their first word, so there is no bookkeeping overhead
/// outside the region itself.
///
/// *   `malloc` is O(1) and ignores its size argument: a slot is a slot.
///     Requests larger than [`block_size`](Self::block_size) are *not* refused.
/// *   `free` is O(1), or O(free list) with the double-free guard enabled -
///     the only way to catch a double free without per-slot marks
/// *   `free` validates the pointer is in range and on the slot grid
///     ([`Failure::OutOfRange`] otherwise)
///
/// Identity tag: [`Kind::Pool`] (3).  The alignment is clamped up to at least
/// [`Alignment::WORD`] so the free-list links stay aligned; the slot size is
/// rounded up to a multiple of the alignment, with a word as the floor.
pub struct Pool<'a> {
    region:      Region<'a>,
    block_size:  usize,
    blocks:      usize,
    free_blocks: Cell<usize>,
    free_root:   Cell<usize>, // address of the first free slot; 0 when exhausted
    guard:       bool,
    valid:       bool,
}

impl<'a> Pool<'a> {
    /// Construct over `buffer` with word alignment.  `guard_double_free`
    /// trades O(free list) frees for double-free detection.
    pub fn new(buffer: &'a mut [MaybeUninit<u8>], block_size: usize, guard_double_free: bool) -> Self {
        Self::with_alignment(buffer, block_size, Alignment::WORD, guard_double_free)
    }

    /// Construct over `buffer`; every returned address will be a multiple of
    /// `max(alignment, Alignment::WORD)`.
    pub fn with_alignment(buffer: &'a mut [MaybeUninit<u8>], block_size: usize, alignment: Alignment, guard_double_free: bool) -> Self {
        let alignment = alignment.max(Alignment::WORD);
        let region = Region::new(buffer, alignment);
        let mut pool = Self {
            region,
            block_size:  0,
            blocks:      0,
            free_blocks: Cell::new(0),
            free_root:   Cell::new(0),
            guard:       guard_double_free,
            valid:       false,
        };
        pool.valid = pool.correct_block_size(block_size) <= pool.region.size();
        dout!("HELLO:: pool memory resource");
        dout!("* final alignment is {} bytes", alignment.as_usize());
        dout!("* correct block size due to headers and final alignment is {} bytes", pool.correct_block_size(block_size));
        if pool.valid {
            pool.reset(block_size);
        } else {
            dout!("* memory does not satisfy minimal size requirements !!!");
            let _ = raise(Failure::InvalidConstruction);
        }
        pool
    }

    pub fn from_array<const N: usize>(array: &'a mut MaybeUninit<[MaybeUninit<u8>; N]>, block_size: usize, guard_double_free: bool) -> Self {
        // SAFETY: ✔️ an array of `MaybeUninit<u8>` is always "init", whatever its bytes
        let array : &mut [MaybeUninit<u8>; N] = unsafe { array.assume_init_mut() };
        Self::new(&mut array[..], block_size, guard_double_free)
    }

    /// A slot must at least hold the free-list link that overlays it.
    fn minimal_block_size(&self) -> usize { self.alignment().align_up(size_of::<usize>()) }

    fn correct_block_size(&self, block_size: usize) -> usize {
        self.alignment().checked_align_up(block_size).unwrap_or(usize::MAX).max(self.minimal_block_size())
    }

    /// Re-thread every slot as free, with a (corrected) new `block_size`.
    /// All outstanding allocations are implicitly reclaimed.
    pub fn reset(&mut self, block_size: usize) {
        self.block_size = self.correct_block_size(block_size);
        self.blocks = self.region.aligned_span() / self.block_size;
        self.free_blocks.set(self.blocks);
        if self.blocks == 0 { self.free_root.set(0); return }

        let base = self.region.aligned_base();
        self.free_root.set(base);
        let mut current = base;
        for _ in 0 .. self.blocks - 1 {
            let next = current + self.block_size;
            // SAFETY: ✔️ `current` is a slot start inside the aligned span; slot starts are word-aligned (the base is aligned and the slot size is a multiple of the word-sized-or-larger alignment)
            unsafe { self.region.store_word(current, next) };
            current = next;
        }
        // SAFETY: ✔️ the last slot start is in-region and word-aligned, as above
        unsafe { self.region.store_word(current, 0) };
    }

    pub fn block_size       (&self) -> usize { self.block_size }
    pub fn blocks_count     (&self) -> usize { self.blocks }
    pub fn free_blocks_count(&self) -> usize { self.free_blocks.get() }
    pub fn start_aligned_address(&self) -> usize { self.region.aligned_base() }
    pub fn end_aligned_address  (&self) -> usize { self.region.aligned_end() }
}

impl Debug for Pool<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Pool {{ block size: {}, free: [{}/{}] }}", self.block_size, self.free_blocks.get(), self.blocks)
    }
}

// SAFETY: ✔️ slots are disjoint `block_size`-strided ranges of the exclusively borrowed region; malloc pops a slot off the free list, free pushes one back after range and grid checks
unsafe impl<'a> Resource for Pool<'a> {
    fn kind(&self) -> Kind { Kind::Pool }
    fn alignment(&self) -> Alignment { self.region.alignment() }
    fn region_base(&self) -> Option<usize> { Some(self.region.base_address()) }
    fn is_valid(&self) -> bool { self.valid }
    fn available_size(&self) -> usize { self.free_blocks.get() * self.block_size }

    fn malloc(&self, _size_bytes_dont_matter: usize) -> Result<AllocNN, Failure> {
        dout!("MALLOC:: pool memory resource");
        if !self.valid { return Err(raise(Failure::InvalidConstruction)) }
        let head = self.free_root.get();
        if head == 0 {
            dout!("- no free blocks are available");
            return Err(raise(Failure::OutOfMemory));
        }
        // SAFETY: ✔️ `head` is a free slot threaded by `reset`/`free`; slot starts are in-region and word-aligned
        let next = unsafe { self.region.load_word(head) };
        self.free_root.set(next);
        self.free_blocks.set(self.free_blocks.get() - 1);
        dout!("- handed a free block @{head:#x}\n- free blocks in pool [{}/{}]", self.free_blocks.get(), self.blocks);
        // SAFETY: ✔️ `head` is in-region, and region addresses are nonzero
        Ok(unsafe { AllocNN::new_unchecked(self.region.ptr_at(head).cast()) })
    }

    unsafe fn free(&self, ptr: AllocNN) -> Result<(), Failure> {
        let address = ptr.as_ptr() as usize;
        dout!("FREE:: pool allocator\n- free a block address @{address:#x}");
        if !self.valid { return Err(raise(Failure::InvalidConstruction)) }

        let min_range = self.start_aligned_address();
        let max_range = self.end_aligned_address();
        if address < min_range || address >= max_range {
            dout!("- error: address is not in range [{min_range:#x} -- {max_range:#x}]");
            return Err(raise(Failure::OutOfRange));
        }
        if (address - min_range) % self.block_size != 0 {
            dout!("- error: address is not aligned to {} bytes block sizes", self.block_size);
            return Err(raise(Failure::OutOfRange));
        }

        if self.guard {
            let mut current = self.free_root.get();
            while current != 0 {
                if current == address {
                    dout!("- error: tried to free an already Free block");
                    return Err(raise(Failure::DoubleFree));
                }
                // SAFETY: ✔️ free-list nodes are slot starts threaded by `reset`/`free`
                current = unsafe { self.region.load_word(current) };
            }
        }

        // SAFETY: ✔️ `address` is a slot start: in-range and on the slot grid per the checks above
        unsafe { self.region.store_word(address, self.free_root.get()) };
        self.free_root.set(address);
        self.free_blocks.set(self.free_blocks.get() + 1);
        dout!("- free blocks in pool [{}/{}]", self.free_blocks.get(), self.blocks);
        Ok(())
    }
}



#[test] fn contract_alignment() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    resource::test::alignment(&Pool::from_array(&mut buffer, 64, false));
}

#[test] fn contract_round_trip() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    resource::test::round_trip(&Pool::from_array(&mut buffer, 64, true), 64);
}

#[test] fn slots_are_distinct_and_on_grid() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 32, true);
    let base = memory.start_aligned_address();
    let mut seen = std::vec::Vec::new();
    for _ in 0 .. 5 {
        let p = memory.malloc(32).unwrap().as_ptr() as usize;
        assert_eq!(0, (p - base) % memory.block_size(), "slot @ {p:#x} off the grid");
        assert!(p >= base && p < memory.end_aligned_address());
        assert!(!seen.contains(&p), "slot @ {p:#x} handed out twice");
        seen.push(p);
    }
}

#[test] fn exhausts_every_slot_then_fails() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 32, true);
    let total = memory.blocks_count();
    for remaining in (0 .. total).rev() {
        memory.malloc(32).unwrap();
        assert_eq!(remaining, memory.free_blocks_count());
    }
    assert_eq!(Err(Failure::OutOfMemory), memory.malloc(32));
    assert_eq!(0, memory.available_size());
}

#[test] fn guard_catches_double_free() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 256, true);
    let p1 = memory.malloc(0).unwrap();
    let p2 = memory.malloc(0).unwrap();
    unsafe { memory.free(p1) }.unwrap();
    assert_eq!(Err(Failure::DoubleFree), unsafe { memory.free(p1) });
    unsafe { memory.free(p2) }.unwrap();
    assert_eq!(Err(Failure::DoubleFree), unsafe { memory.free(p2) });
    assert_eq!(Err(Failure::DoubleFree), unsafe { memory.free(p1) });
}

#[test] fn unguarded_free_is_trusting() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 64, false);
    let p = memory.malloc(0).unwrap();
    unsafe { memory.free(p) }.unwrap();
    // without the guard a second free is not detected; the engine trusts the caller
    assert_eq!(Ok(()), unsafe { memory.free(p) });
}

#[test] fn out_of_range_and_off_grid_free_fail() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 512]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 64, true);
    let p = memory.malloc(0).unwrap();

    let past_end = memory.end_aligned_address();
    let bogus = unsafe { AllocNN::new_unchecked(memory.region.ptr_at(past_end).cast()) };
    assert_eq!(Err(Failure::OutOfRange), unsafe { memory.free(bogus) });

    let off_grid = unsafe { AllocNN::new_unchecked(p.as_ptr().add(8)) };
    assert_eq!(Err(Failure::OutOfRange), unsafe { memory.free(off_grid) });

    unsafe { memory.free(p) }.unwrap();
}

#[test] fn block_size_is_corrected() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 512]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 3, false);
    assert_eq!(memory.block_size(), memory.alignment().align_up(core::mem::size_of::<usize>()));
}

#[test] fn oversized_block_is_invalid() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 64]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 128, false);
    assert!(!memory.is_valid());
    assert_eq!(Err(Failure::InvalidConstruction), memory.malloc(0));
    let bogus = unsafe { AllocNN::new_unchecked(core::ptr::NonNull::<u8>::dangling().as_ptr().cast()) };
    assert_eq!(Err(Failure::InvalidConstruction), unsafe { memory.free(bogus) });
}

#[test] fn equality_is_by_region() {
    let mut a : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let mut b : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let ra = Pool::from_array(&mut a, 32, false);
    let rb = Pool::from_array(&mut b, 32, false);
    assert!(ra.is_equal(&ra));
    resource::test::distinct(&ra, &rb);
}
