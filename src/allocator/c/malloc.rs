use crate::*;



/// The system C heap: a pass-through to [`libc::malloc`] / [`libc::free`]
///
/// | Resource             | C                 |
/// | ---------------------| ------------------|
/// | [`Resource::malloc`] | [`libc::malloc`]  |
/// | [`Resource::free`]   | [`libc::free`]    |
///
/// `available_size` is a white lie ([`usize::MAX`]) and `free` always
/// reports success - the C heap offers nothing better on either count.
///
/// Identity tag: [`Kind::Std`] (0); any two compare equal, since they share
/// the one process heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)] pub struct Malloc;

// SAFETY: ✔️ the C heap returns allocations aligned for any fundamental type, disjoint and stable until freed
unsafe impl Resource for Malloc {
    fn kind(&self) -> Kind { Kind::Std }

    /// `_Alignof(max_align_t)` in theory; the alignment of [`f64`] is the portable floor.
    fn alignment(&self) -> Alignment { Alignment::of::<f64>() }

    fn available_size(&self) -> usize { usize::MAX }

    #[track_caller] fn malloc(&self, size_bytes: usize) -> Result<AllocNN, Failure> {
        dout!("MALLOC:: standard memory\n- request a block of size {size_bytes}");
        // SAFETY: ✔️ `malloc` is sound for any size; null is handled below
        let alloc = unsafe { libc::malloc(size_bytes) };
        core::ptr::NonNull::new(alloc.cast()).ok_or_else(|| raise(Failure::OutOfMemory))
    }

    #[track_caller] unsafe fn free(&self, ptr: AllocNN) -> Result<(), Failure> {
        dout!("FREE:: standard memory");
        // SAFETY: ✔️ `ptr` came from this resource's `malloc` per the trait's free precondition, so it is the C heap's to release
        unsafe { libc::free(ptr.as_ptr().cast()) };
        Ok(())
    }
}



#[test] fn round_trips() {
    let alloc = Malloc.malloc(64).unwrap();
    // SAFETY: ✔️ 64 bytes were just allocated
    unsafe { alloc.as_ptr().cast::<u8>().write_bytes(0x5A, 64) };
    unsafe { Malloc.free(alloc) }.unwrap();
}

#[test] fn contract_alignment() {
    resource::test::alignment(&Malloc);
}

#[test] fn all_c_heaps_are_equal() {
    assert!(Malloc.is_equal(&Malloc));
    resource::test::distinct(&Malloc, &crate::allocator::debug::Void);
}
