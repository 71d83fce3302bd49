use crate::*;

use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::mem::{size_of, MaybeUninit};



const WORD : usize = size_of::<usize>();

/// Low bit of a boundary-tag word: set while the block is allocated.  Block
/// sizes are multiples of the engine alignment (a power of two >= the word
/// size), so the low bit of a size is always spare.
const ALLOCATED_BIT : usize = 1;

/// A boundary-tag word: block size packed with the allocated bit.
#[derive(Clone, Copy, PartialEq, Eq)] struct TagWord(usize);

impl TagWord {
    fn new(size: usize, allocated: bool) -> Self { Self(size | if allocated { ALLOCATED_BIT } else { 0 }) }
    fn size        (self) -> usize { self.0 & !ALLOCATED_BIT }
    fn is_allocated(self) -> bool  { self.0 &  ALLOCATED_BIT != 0 }
    fn toggled     (self) -> Self  { Self(self.0 ^ ALLOCATED_BIT) }
}

/// A block `[from, to)` of the partition.  Plain addresses; all reads and
/// writes of its tags and links go through the engine.
#[derive(Clone, Copy)] struct Block { from: usize, to: usize }

impl Block { fn size(self) -> usize { self.to - self.from } }

/// Best-fit free-list allocate from a caller-supplied region, with
/// boundary-tag coalescing
///
/// The region is always partitioned into adjacent blocks.  Every block opens
/// and closes with an identical tag word (size | allocated bit); free blocks
/// additionally hold `prev`/`next` list links right after the opening tag,
/// space that allocated blocks reuse as payload:
///
/// ```text
/// allocated:  [ size|1 | .. payload ..                  | size|1 ]
/// free:       [ size|0 | prev | next | .. padding ..    | size|0 ]
/// ```
///
/// The free list is doubly linked and kept in ascending address order, which
/// is known to reduce fragmentation.
///
/// *   `malloc` is O(free list): best fit, first encountered on ties, with
///     in-place splitting when the remainder stays useful
/// *   `free` is O(1) when it coalesces with a neighbor (the neighbors pin
///     down the insertion spot), O(free list) otherwise
/// *   `free` rejects misaligned pointers, pointers whose header and footer
///     tags disagree, and blocks already marked free; beyond that it trusts
///     the caller, as a full membership check would cost O(free list) on
///     every call
///
/// Identity tag: [`Kind::Dynamic`] (2).  The alignment is clamped up to at
/// least [`Alignment::WORD`] so tag and link words stay aligned.
pub struct Dynamic<'a> {
    region:      Region<'a>,
    free_root:   Cell<usize>, // address of the first free block's header; 0 when none
    allocations: Cell<usize>, // whole-block bytes currently allocated
    valid:       bool,
}

impl<'a> Dynamic<'a> {
    /// Construct over `buffer` with word alignment.
    pub fn new(buffer: &'a mut [MaybeUninit<u8>]) -> Self { Self::with_alignment(buffer, Alignment::WORD) }

    /// Construct over `buffer`; every returned address will be a multiple of
    /// `max(alignment, Alignment::WORD)`.
    pub fn with_alignment(buffer: &'a mut [MaybeUninit<u8>], alignment: Alignment) -> Self {
        let alignment = alignment.max(Alignment::WORD);
        let region = Region::new(buffer, alignment);
        let mut memory = Self { region, free_root: Cell::new(0), allocations: Cell::new(0), valid: false };
        memory.valid = memory.region.aligned_span() >= memory.minimal_block_size();
        dout!("HELLO:: dynamic memory resource");
        dout!("* final alignment is {} bytes", alignment.as_usize());
        dout!("* minimal block size due to headers, footers and alignment is {} bytes", memory.minimal_block_size());
        if memory.valid {
            // SAFETY: ✔️ the aligned span holds at least one minimal block, so the tag, link and footer words all fit
            let block = unsafe { memory.create_free_block(memory.region.base_address(), memory.region.base_address() + memory.region.size()) };
            memory.free_root.set(block.from);
        } else {
            dout!("* error:: memory does not satisfy minimal size requirements !!!");
            let _ = raise(Failure::InvalidConstruction);
        }
        memory
    }

    pub fn from_array<const N: usize>(array: &'a mut MaybeUninit<[MaybeUninit<u8>; N]>) -> Self {
        // SAFETY: ✔️ an array of `MaybeUninit<u8>` is always "init", whatever its bytes
        let array : &mut [MaybeUninit<u8>; N] = unsafe { array.assume_init_mut() };
        Self::new(&mut array[..])
    }

    pub fn start_aligned_address(&self) -> usize { self.region.aligned_base() }
    pub fn end_aligned_address  (&self) -> usize { self.region.aligned_end() }

    // ---- block geometry -------------------------------------------------

    /// Aligned footprint of a lone tag word (opening or closing).
    fn aligned_word(&self) -> usize { self.alignment().align_up(WORD) }

    /// Aligned footprint of a free block's opening tag plus both links.
    fn free_header_size(&self) -> usize { self.alignment().align_up(3 * WORD) }

    /// Every block is at least this big, so a freshly freed block can host
    /// the free-list links.
    fn minimal_block_size(&self) -> usize { self.free_header_size() + self.aligned_word() }

    /// Opening tag plus closing tag; what a block consumes beyond payload.
    fn overhead(&self) -> usize { 2 * self.aligned_word() }

    /// Whole-block size needed to serve an (aligned) `payload`.
    fn required_block_size(&self, payload: usize) -> usize { (self.overhead() + payload).max(self.minimal_block_size()) }

    // ---- tag and link plumbing ------------------------------------------
    //
    // Safety, for all of these: the address arguments must denote blocks of
    // the current partition (or free-list nodes, for the link accessors).
    // The partition invariant keeps all their words inside the region.

    unsafe fn tag_at(&self, address: usize) -> TagWord {
        // SAFETY: ✔️ per the fn precondition above
        TagWord(unsafe { self.region.load_word(address) })
    }

    unsafe fn footer_at(&self, block: Block) -> TagWord {
        // SAFETY: ✔️ the closing tag lives `aligned_word` below the block end
        unsafe { self.tag_at(block.to - self.aligned_word()) }
    }

    /// Stamp both tags of `block`.
    unsafe fn write_tags(&self, block: Block, allocated: bool) {
        let tag = TagWord::new(block.size(), allocated);
        // SAFETY: ✔️ per the fn precondition above
        unsafe {
            self.region.store_word(block.from, tag.0);
            self.region.store_word(block.to - self.aligned_word(), tag.0);
        }
    }

    /// Flip the allocated bit in both tags of `block`.
    unsafe fn toggle_tags(&self, block: Block) {
        // SAFETY: ✔️ per the fn precondition above
        unsafe {
            let tag = self.tag_at(block.from).toggled();
            self.region.store_word(block.from, tag.0);
            self.region.store_word(block.to - self.aligned_word(), tag.0);
        }
    }

    unsafe fn prev_of(&self, node: usize) -> usize {
        // SAFETY: ✔️ free blocks keep their `prev` link one word past the opening tag
        unsafe { self.region.load_word(node + WORD) }
    }

    unsafe fn next_of(&self, node: usize) -> usize {
        // SAFETY: ✔️ free blocks keep their `next` link two words past the opening tag
        unsafe { self.region.load_word(node + 2 * WORD) }
    }

    unsafe fn set_prev(&self, node: usize, prev: usize) {
        // SAFETY: ✔️ as `prev_of`
        unsafe { self.region.store_word(node + WORD, prev) }
    }

    unsafe fn set_next(&self, node: usize, next: usize) {
        // SAFETY: ✔️ as `next_of`
        unsafe { self.region.store_word(node + 2 * WORD, next) }
    }

    /// Unlink `node` from the free list, fixing the root and both neighbors.
    unsafe fn unlink(&self, node: usize) {
        // SAFETY: ✔️ `node` is on the free list per the fn precondition, so its links and its neighbors' links are live
        unsafe {
            let prev = self.prev_of(node);
            let next = self.next_of(node);
            if prev != 0 { self.set_next(prev, next) } else { self.free_root.set(next) }
            if next != 0 { self.set_prev(next, prev) }
        }
    }

    /// Stamp `[from, to)` (aligned inward) as one free block with cleared links.
    unsafe fn create_free_block(&self, from: usize, to: usize) -> Block {
        let block = Block { from: self.alignment().align_up(from), to: self.alignment().align_down(to) };
        // SAFETY: ✔️ the block covers whole partition blocks (or the initial span), so tag and link words fit
        unsafe {
            self.write_tags(block, false);
            self.set_prev(block.from, 0);
            self.set_next(block.from, 0);
        }
        block
    }

    /// Split `node` (a free block of `size` bytes) into an allocated left
    /// part of `required` bytes plus a free remainder that takes `node`'s
    /// place on the list - or, if the remainder would drop below the minimal
    /// block size plus one alignment of slack, take the whole block off the
    /// list.  Returns the allocated block.
    unsafe fn split_or_take(&self, node: usize, size: usize, required: usize) -> Block {
        let remainder_floor = self.minimal_block_size() + self.alignment().as_usize();
        // SAFETY: ✔️ `node` is a live free-list node per the fn precondition
        unsafe {
            if required + remainder_floor <= size {
                let prev = self.prev_of(node);
                let next = self.next_of(node);
                let left  = Block { from: node, to: node + required };
                let right = Block { from: left.to, to: node + size };
                self.write_tags(left, true);
                self.write_tags(right, false);
                // the remainder inherits the candidate's list position, so the address order is untouched
                self.set_prev(right.from, prev);
                self.set_next(right.from, next);
                if prev != 0 { self.set_next(prev, right.from) } else { self.free_root.set(right.from) }
                if next != 0 { self.set_prev(next, right.from) }
                dout!("- split:: from size [{size}] bytes into two blocks of sizes [{}:{}]", left.size(), right.size());
                left
            } else {
                self.unlink(node);
                let whole = Block { from: node, to: node + size };
                self.write_tags(whole, true);
                whole
            }
        }
    }
}

impl Debug for Dynamic<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Dynamic {{ free blocks: [")?;
        let mut node = self.free_root.get();
        while node != 0 {
            // SAFETY: ✔️ free-list nodes are block headers maintained by this engine
            let (size, next) = unsafe { (self.tag_at(node).size(), self.next_of(node)) };
            write!(f, "{size}{}", if next != 0 { "->" } else { "" })?;
            node = next;
        }
        write!(f, "], available: {}/{} }}", self.available_size(), self.region.aligned_span())
    }
}

// SAFETY: ✔️ the partition invariant (adjacent blocks covering the aligned span, matching tags at both ends, free list = exactly the free blocks in address order) makes every handed-out payload disjoint from all others and from all metadata words
unsafe impl<'a> Resource for Dynamic<'a> {
    fn kind(&self) -> Kind { Kind::Dynamic }
    fn alignment(&self) -> Alignment { self.region.alignment() }
    fn region_base(&self) -> Option<usize> { Some(self.region.base_address()) }
    fn is_valid(&self) -> bool { self.valid }
    fn available_size(&self) -> usize { self.region.aligned_span() - self.allocations.get() }

    fn malloc(&self, size_bytes: usize) -> Result<AllocNN, Failure> {
        if !self.valid { return Err(raise(Failure::InvalidConstruction)) }
        let Some(payload) = self.alignment().checked_align_up(size_bytes) else { return Err(raise(Failure::OutOfMemory)) };
        dout!("MALLOC:: dynamic allocator\n- requested block size is {payload} bytes (aligned up)");

        // best fit: smallest block whose effective payload still fits, the
        // first such block winning ties
        let mut best = 0usize;
        let mut best_size = 0usize;
        let mut current = self.free_root.get();
        while current != 0 {
            // SAFETY: ✔️ free-list nodes are block headers maintained by this engine
            let size = unsafe { self.tag_at(current) }.size();
            if payload <= size - self.overhead() && (best == 0 || size < best_size) {
                best = current;
                best_size = size;
            }
            // SAFETY: ✔️ as above
            current = unsafe { self.next_of(current) };
        }
        if best == 0 {
            dout!("- search failure:: no block was found");
            return Err(raise(Failure::OutOfMemory));
        }

        let required = self.required_block_size(payload);
        // SAFETY: ✔️ `best` is a live free-list node of size `best_size`
        let chosen = unsafe { self.split_or_take(best, best_size, required) };
        self.allocations.set(self.allocations.get() + chosen.size());

        let address = chosen.from + self.aligned_word();
        dout!("- fulfilled:: block of size {} bytes\n              address is {address:#x}", chosen.size());
        // SAFETY: ✔️ `address` points into `chosen`, which is inside the region; region addresses are nonzero
        Ok(unsafe { AllocNN::new_unchecked(self.region.ptr_at(address).cast()) })
    }

    unsafe fn free(&self, ptr: AllocNN) -> Result<(), Failure> {
        let address = ptr.as_ptr() as usize;
        dout!("FREE:: dynamic allocator\n- address @{address:#x}");
        if !self.valid { return Err(raise(Failure::InvalidConstruction)) }
        if !self.alignment().is_aligned(address) {
            dout!("- error: address is misaligned to {} bytes", self.alignment().as_usize());
            return Err(raise(Failure::MisalignedFree));
        }

        let base = self.start_aligned_address();
        let end  = self.end_aligned_address();

        // decode the block, refusing to touch anything that could sit outside
        // the region: a garbage "size" must not steer the footer read astray
        let header = match address.checked_sub(self.aligned_word()) {
            Some(header) if header >= base && header + WORD <= end => header,
            _ => return Err(raise(Failure::NotABlock)),
        };
        // SAFETY: ✔️ `header` is an in-region word-aligned address per the checks above
        let tag = unsafe { self.tag_at(header) };
        let block = match header.checked_add(tag.size()) {
            Some(to) if to <= end => Block { from: header, to },
            _ => return Err(raise(Failure::NotABlock)),
        };
        if !self.alignment().is_aligned(tag.size()) || tag.size() < self.minimal_block_size() {
            return Err(raise(Failure::NotABlock));
        }
        // SAFETY: ✔️ the closing tag lies inside `[base, end)` per the checks above
        if unsafe { self.footer_at(block) } != tag {
            dout!("- failed sanity check, this is probably not a block address");
            return Err(raise(Failure::NotABlock));
        }
        if !tag.is_allocated() {
            dout!("- error: block is marked as Free !!!");
            return Err(raise(Failure::DoubleFree));
        }

        // flip to free before any list surgery: a second free of this pointer
        // now dies on the is_allocated check above
        // SAFETY: ✔️ `block` passed the sanity checks, so it is a partition block
        unsafe { self.toggle_tags(block) };
        self.allocations.set(self.allocations.get() - block.size());

        let mut leftmost   = block.from;
        let mut rightmost  = block.to;
        let mut left_hint  = 0usize;
        let mut right_hint = 0usize;

        if block.from != base {
            // the left neighbor's closing tag sits just below our header
            // SAFETY: ✔️ not the first block, so a whole block (closing tag included) precedes `block.from`
            let left_size = unsafe { self.tag_at(block.from - self.aligned_word()) }.size();
            let left = Block { from: block.from - left_size, to: block.from };
            // SAFETY: ✔️ `left` is the adjacent partition block
            if !unsafe { self.tag_at(left.from) }.is_allocated() {
                // SAFETY: ✔️ a free partition block is on the list; remember where it sat
                left_hint = unsafe { self.prev_of(left.from) };
                // SAFETY: ✔️ as above
                unsafe { self.unlink(left.from) };
                leftmost = left.from;
            }
        }

        if block.to != end {
            // SAFETY: ✔️ not the last block, so another partition block opens at `block.to`
            let right_tag = unsafe { self.tag_at(block.to) };
            if !right_tag.is_allocated() {
                // SAFETY: ✔️ a free partition block is on the list; remember where it sat
                right_hint = unsafe { self.next_of(block.to) };
                // SAFETY: ✔️ as above
                unsafe { self.unlink(block.to) };
                rightmost = block.to + right_tag.size();
            }
        }

        let was_empty = self.free_root.get() == 0;
        // SAFETY: ✔️ `[leftmost, rightmost)` covers one to three whole partition blocks
        let merged = unsafe { self.create_free_block(leftmost, rightmost) };
        dout!("- new free block: size {}, spans addresses [{:#x}-{:#x}]", merged.size(), merged.from, merged.to);

        if was_empty {
            self.free_root.set(merged.from);
        } else if left_hint != 0 {
            // a left coalesce pins the spot: right after the hint
            // SAFETY: ✔️ `left_hint` survived the unlinking and is still on the list
            unsafe {
                let after = self.next_of(left_hint);
                self.set_prev(merged.from, left_hint);
                self.set_next(merged.from, after);
                if after != 0 { self.set_prev(after, merged.from) }
                self.set_next(left_hint, merged.from);
            }
        } else if right_hint != 0 {
            // a right coalesce pins the spot: right before the hint
            // SAFETY: ✔️ `right_hint` survived the unlinking and is still on the list
            unsafe {
                let before = self.prev_of(right_hint);
                self.set_prev(merged.from, before);
                self.set_next(merged.from, right_hint);
                if before != 0 { self.set_next(before, merged.from) }
                self.set_prev(right_hint, merged.from);
                if self.free_root.get() == right_hint { self.free_root.set(merged.from) }
            }
        } else {
            // no coalesce: walk for the first node past the new block
            // SAFETY: ✔️ the walk only touches live free-list nodes
            unsafe {
                let mut current = self.free_root.get();
                let mut before  = current;
                while current != 0 && current < merged.from {
                    before = current;
                    current = self.next_of(current);
                }
                if current == 0 {
                    // walked off the tail
                    self.set_next(before, merged.from);
                    self.set_prev(merged.from, before);
                } else {
                    let ahead = self.prev_of(current);
                    self.set_prev(merged.from, ahead);
                    self.set_next(merged.from, current);
                    if ahead != 0 { self.set_next(ahead, merged.from) } else { self.free_root.set(merged.from) }
                    self.set_prev(current, merged.from);
                }
            }
        }
        Ok(())
    }
}



#[cfg(test)] impl Dynamic<'_> {
    /// The free list as `(header address, size)` pairs, in list order.
    fn free_list(&self) -> std::vec::Vec<(usize, usize)> {
        let mut out = std::vec::Vec::new();
        let mut node = self.free_root.get();
        while node != 0 {
            let (size, next) = unsafe { (self.tag_at(node).size(), self.next_of(node)) };
            out.push((node, size));
            node = next;
        }
        out
    }

    /// The whole partition as `(from, size, allocated)` triples, walked by tags.
    fn partition(&self) -> std::vec::Vec<(usize, usize, bool)> {
        let mut out = std::vec::Vec::new();
        let mut from = self.start_aligned_address();
        while from < self.end_aligned_address() {
            let tag = unsafe { self.tag_at(from) };
            out.push((from, tag.size(), tag.is_allocated()));
            assert!(tag.size() > 0, "zero-sized block in partition");
            from += tag.size();
        }
        out
    }
}

#[cfg(test)] fn assert_invariants(memory: &Dynamic<'_>) {
    // capacity conservation: block sizes sum to the aligned span
    let partition = memory.partition();
    let total : usize = partition.iter().map(|(_, size, _)| size).sum();
    assert_eq!(total, memory.end_aligned_address() - memory.start_aligned_address());

    // coalesce maximality: no two adjacent free blocks
    for pair in partition.windows(2) {
        assert!(pair[0].2 || pair[1].2, "adjacent free blocks @ {:#x} and {:#x}", pair[0].0, pair[1].0);
    }

    // the free list is exactly the free blocks, in strictly ascending address order
    let free : std::vec::Vec<_> = partition.iter().filter(|(_, _, allocated)| !allocated).map(|&(from, size, _)| (from, size)).collect();
    assert_eq!(free, memory.free_list());
}

#[test] fn contract_alignment() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 4096]> = MaybeUninit::uninit();
    resource::test::alignment(&Dynamic::from_array(&mut buffer));
}

#[test] fn contract_round_trip() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 4096]> = MaybeUninit::uninit();
    resource::test::round_trip(&Dynamic::from_array(&mut buffer), 200);
}

#[test] fn frees_in_any_order_coalesce_back_to_one_block() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 5000]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let span = memory.end_aligned_address() - memory.start_aligned_address();

    let a = memory.malloc(200).unwrap();
    let b = memory.malloc(200).unwrap();
    let c = memory.malloc(200).unwrap();
    assert_invariants(&memory);

    unsafe { memory.free(c) }.unwrap();
    assert_invariants(&memory);
    unsafe { memory.free(a) }.unwrap();
    assert_invariants(&memory);
    unsafe { memory.free(b) }.unwrap();
    assert_invariants(&memory);

    assert_eq!(memory.free_list(), std::vec![(memory.start_aligned_address(), span)]);
    assert_eq!(span, memory.available_size());
}

#[test] fn best_fit_reuses_freed_slot() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 5000]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);

    let a = memory.malloc(200).unwrap();
    let _b = memory.malloc(200).unwrap();
    unsafe { memory.free(a) }.unwrap();

    // the 150-byte request best-fits into a's old slot, not the big tail
    let c = memory.malloc(150).unwrap();
    assert_eq!(a.as_ptr() as usize, c.as_ptr() as usize);
    assert_invariants(&memory);

    // at most the split remainder and the tail remain free, remainder first
    let free = memory.free_list();
    assert!(free.len() <= 2, "free list: {free:?}");
    assert!(free.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test] fn exhaust_then_reverse_free_restores_initial_state() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 5000]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let initial = memory.free_list();
    assert_eq!(1, initial.len());

    let mut live = std::vec::Vec::new();
    while let Ok(p) = memory.malloc(96) { live.push(p) }
    assert!(live.len() > 10);
    assert_invariants(&memory);

    for p in live.into_iter().rev() {
        unsafe { memory.free(p) }.unwrap();
        assert_invariants(&memory);
    }
    assert_eq!(initial, memory.free_list());
}

#[test] fn interleaved_churn_keeps_invariants() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 5000]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);

    let mut live = std::vec::Vec::new();
    for round in 0 .. 6 {
        for size in [40usize, 200, 16, 350, 96] {
            if let Ok(p) = memory.malloc(size + round) { live.push(p) }
            assert_invariants(&memory);
        }
        // free every other live block, middle-out-ish
        let mut index = 0;
        live.retain(|&p| {
            index += 1;
            if index % 2 == 0 { unsafe { memory.free(p) }.unwrap(); false } else { true }
        });
        assert_invariants(&memory);
    }
    for p in live { unsafe { memory.free(p) }.unwrap() }
    assert_invariants(&memory);
    assert_eq!(1, memory.free_list().len());
}

#[test] fn double_free_is_rejected_and_harmless() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 5000]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let a = memory.malloc(200).unwrap();
    unsafe { memory.free(a) }.unwrap();
    let before = memory.free_list();
    assert_eq!(Err(Failure::DoubleFree), unsafe { memory.free(a) });
    assert_eq!(before, memory.free_list());
}

#[test] fn misaligned_free_is_rejected() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let a = memory.malloc(64).unwrap();
    let bogus = unsafe { AllocNN::new_unchecked(a.as_ptr().add(1)) };
    assert_eq!(Err(Failure::MisalignedFree), unsafe { memory.free(bogus) });
    unsafe { memory.free(a) }.unwrap();
}

#[test] fn interior_pointer_fails_the_sanity_check() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let a = memory.malloc(256).unwrap();
    // fill the payload so the "header" the engine decodes is garbage, not uninit
    unsafe { a.as_ptr().cast::<u8>().write_bytes(0xAB, 256) };
    // aligned, but points into a's payload rather than at a block
    let align = memory.alignment().as_usize();
    let bogus = unsafe { AllocNN::new_unchecked(a.as_ptr().add(4 * align)) };
    assert_eq!(Err(Failure::NotABlock), unsafe { memory.free(bogus) });
    unsafe { memory.free(a) }.unwrap();
}

#[test] fn zero_byte_requests_get_a_minimal_block() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let a = memory.malloc(0).unwrap();
    assert_invariants(&memory);
    unsafe { memory.free(a) }.unwrap();
    assert_invariants(&memory);
}

#[test] fn no_split_when_remainder_would_be_useless() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let span = memory.end_aligned_address() - memory.start_aligned_address();
    // leave the tail just under minimal-plus-slack and ask for all the rest
    let a = memory.malloc(span - memory.overhead() - memory.minimal_block_size()).unwrap();
    // the whole region went into one block: nothing useful remained to split off
    assert_eq!(0, memory.free_list().len());
    assert_eq!(0, memory.available_size());
    unsafe { memory.free(a) }.unwrap();
    assert_eq!(span, memory.available_size());
}

#[test] fn too_small_region_is_invalid() {
    let mut tiny = [MaybeUninit::new(0u8); 8];
    let memory = Dynamic::new(&mut tiny[..]);
    assert!(!memory.is_valid());
    assert_eq!(Err(Failure::InvalidConstruction), memory.malloc(1));
}

#[test] fn larger_alignment_is_honored() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 4096]> = MaybeUninit::uninit();
    let alignment = Alignment::new(64).unwrap();
    let array : &mut [MaybeUninit<u8>; 4096] = unsafe { buffer.assume_init_mut() };
    let memory = Dynamic::with_alignment(&mut array[..], alignment);
    resource::test::alignment(&memory);
    let a = memory.malloc(100).unwrap();
    assert_eq!(0, (a.as_ptr() as usize) % 64);
    unsafe { memory.free(a) }.unwrap();
    assert_invariants(&memory);
}

#[test] fn equality_is_by_region() {
    let mut a : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let mut b : MaybeUninit<[MaybeUninit<u8>; 256]> = MaybeUninit::uninit();
    let ra = Dynamic::from_array(&mut a);
    let rb = Dynamic::from_array(&mut b);
    assert!(ra.is_equal(&ra));
    resource::test::distinct(&ra, &rb);
}
