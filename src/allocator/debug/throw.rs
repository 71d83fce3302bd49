use crate::*;



/// Panics on any use - plant it where no allocation must ever happen.
///
/// Unlike the `panicy-failures` feature, this resource panics
/// unconditionally.  Identity tag: [`Kind::Throw`] (6); any two compare equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)] pub struct Throw;

// SAFETY: ✔️ trivially: no memory is ever handed out
unsafe impl Resource for Throw {
    fn kind(&self) -> Kind { Kind::Throw }
    fn alignment(&self) -> Alignment { Alignment::WORD }
    fn available_size(&self) -> usize { 0 }

    #[track_caller] fn malloc(&self, _size_bytes: usize) -> Result<AllocNN, Failure> {
        panic!("throw memory resource: malloc on a resource that must never allocate")
    }

    #[track_caller] unsafe fn free(&self, _ptr: AllocNN) -> Result<(), Failure> {
        panic!("throw memory resource: free on a resource that never allocated")
    }
}



#[test] #[should_panic(expected = "throw memory resource")] fn malloc_panics() {
    let _ = Throw.malloc(1);
}

#[test] fn all_throws_are_equal() {
    assert!(Throw.is_equal(&Throw));
}
