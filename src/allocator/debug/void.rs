use crate::*;



/// Allocates nothing: `malloc` always fails, `free` always succeeds.
///
/// A stand-in for code paths that must tolerate a resource with no memory
/// behind it.  Identity tag: [`Kind::Void`] (5); any two compare equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)] pub struct Void;

// SAFETY: ✔️ trivially: no memory is ever handed out
unsafe impl Resource for Void {
    fn kind(&self) -> Kind { Kind::Void }
    fn alignment(&self) -> Alignment { Alignment::WORD }
    fn available_size(&self) -> usize { 0 }

    fn malloc(&self, size_bytes: usize) -> Result<AllocNN, Failure> {
        dout!("MALLOC:: void memory\n- requested {size_bytes} bytes\n- nothing will be fulfilled");
        let _ = size_bytes;
        Err(raise(Failure::OutOfMemory))
    }

    unsafe fn free(&self, _ptr: AllocNN) -> Result<(), Failure> {
        dout!("FREE:: void memory");
        Ok(())
    }
}



#[test] fn never_allocates() {
    assert_eq!(Err(Failure::OutOfMemory), Void.malloc(1));
    assert_eq!(0, Void.available_size());
}

#[test] fn all_voids_are_equal() {
    assert!(Void.is_equal(&Void));
}
