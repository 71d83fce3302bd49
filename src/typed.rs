use crate::*;

use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::{drop_in_place, NonNull};



/// Bytes reserved ahead of [`TypedAlloc::new_array_with`] payloads for the
/// element count.  Divisible by every alignment the engines hand out in
/// practice; element types over-aligned past it are rejected at compile time.
const ARRAY_HEADER : usize = 16;

/// A typed facade over any [`Resource`]: raw bytes in, constructed objects out
///
/// Owns no memory and is [`Copy`]; copies share the resource.  Two facades
/// compare equal iff their resources do, i.e. objects may cross between them
/// on free.
///
/// The facade cannot outlive its resource (`'r`), and it is on the caller to
/// destroy/deallocate through it before the resource goes away.
pub struct TypedAlloc<'r, T = u8> {
    resource: &'r dyn Resource,
    _element: PhantomData<fn() -> T>,
}

impl<'r, T> Clone for TypedAlloc<'r, T> { fn clone(&self) -> Self { *self } }
impl<'r, T> Copy  for TypedAlloc<'r, T> {}
impl<'r, T> Debug for TypedAlloc<'r, T> { fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "TypedAlloc {{ resource kind: {:?} }}", self.resource.kind()) } }

impl<'r, 's, T, U> PartialEq<TypedAlloc<'s, U>> for TypedAlloc<'r, T> {
    fn eq(&self, other: &TypedAlloc<'s, U>) -> bool { self.resource.is_equal(other.resource) }
}

impl<'r, T> TypedAlloc<'r, T> {
    /// If this fires, `new_array_with` could never place `T`s after the count
    /// header; no engine alignment would rescue it.
    const ASSERT_HEADER_HOLDS_T_ALIGNMENT : () = assert!(align_of::<T>() <= ARRAY_HEADER, "element alignment exceeds the array count header");

    pub fn new(resource: &'r dyn Resource) -> Self { Self { resource, _element: PhantomData } }

    pub fn resource(&self) -> &'r dyn Resource { self.resource }

    /// The same facade for a different element type, sharing the resource.
    pub fn rebind<U>(&self) -> TypedAlloc<'r, U> { TypedAlloc::new(self.resource) }

    /// Allocate raw storage for `n` elements of `T`.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, Failure> {
        debug_assert!(align_of::<T>() <= self.resource.alignment().as_usize(), "the resource alignment cannot satisfy T");
        let bytes = size_of::<T>().checked_mul(n).ok_or_else(|| raise(Failure::OutOfMemory))?;
        Ok(self.resource.malloc(bytes)?.cast())
    }

    /// Release storage previously obtained from [`allocate`](Self::allocate).
    ///
    /// ### Safety
    /// *   `ptr` must come from `allocate` on an equal resource, with every element already destroyed, and not be used again
    pub unsafe fn deallocate(&self, ptr: NonNull<T>) -> Result<(), Failure> {
        // SAFETY: ✔️ forwarded precondition
        unsafe { self.resource.free(ptr.cast()) }
    }

    /// Move `value` into the uninitialized slot at `ptr`.
    ///
    /// ### Safety
    /// *   `ptr` must be valid for writes of `T` and aligned for `T`
    pub unsafe fn construct(&self, ptr: NonNull<T>, value: T) {
        // SAFETY: ✔️ valid-for-writes and aligned per the fn preconditions
        unsafe { ptr.as_ptr().write(value) }
    }

    /// Run `T`'s destructor in place; the storage stays allocated.
    ///
    /// ### Safety
    /// *   `ptr` must point at a live `T` that nothing else references, and the value must not be used afterwards
    pub unsafe fn destroy(&self, ptr: NonNull<T>) {
        // SAFETY: ✔️ live and unaliased per the fn preconditions
        unsafe { drop_in_place(ptr.as_ptr()) }
    }

    /// [`allocate`](Self::allocate) one `T` and [`construct`](Self::construct) `value` into it.
    pub fn new_object(&self, value: T) -> Result<NonNull<T>, Failure> {
        let ptr = self.allocate(1)?;
        // SAFETY: ✔️ freshly allocated storage for one T, aligned per the resource contract
        unsafe { self.construct(ptr, value) };
        Ok(ptr)
    }

    /// [`destroy`](Self::destroy) the object and [`deallocate`](Self::deallocate) its storage.
    ///
    /// ### Safety
    /// *   `ptr` must come from [`new_object`](Self::new_object) on an equal resource and not be used again
    pub unsafe fn delete_object(&self, ptr: NonNull<T>) -> Result<(), Failure> {
        // SAFETY: ✔️ forwarded preconditions
        unsafe {
            self.destroy(ptr);
            self.deallocate(ptr)
        }
    }

    /// Allocate and construct `count` elements, each built by `init(index)`,
    /// preceded by a hidden count header.  Release only via
    /// [`delete_array`](Self::delete_array).
    pub fn new_array_with(&self, count: usize, mut init: impl FnMut(usize) -> T) -> Result<NonNull<T>, Failure> {
        let _ = Self::ASSERT_HEADER_HOLDS_T_ALIGNMENT;
        debug_assert!(align_of::<T>() <= self.resource.alignment().as_usize(), "the resource alignment cannot satisfy T");
        let payload = size_of::<T>().checked_mul(count).ok_or_else(|| raise(Failure::OutOfMemory))?;
        let bytes = ARRAY_HEADER.checked_add(payload).ok_or_else(|| raise(Failure::OutOfMemory))?;
        let raw = self.resource.malloc(bytes)?;

        // SAFETY: ✔️ the allocation starts word-aligned and holds ARRAY_HEADER + count * size_of::<T>() bytes
        unsafe { raw.as_ptr().cast::<usize>().write(count) };
        // SAFETY: ✔️ the payload begins ARRAY_HEADER bytes in, inside the allocation
        let first = unsafe { raw.as_ptr().cast::<u8>().add(ARRAY_HEADER) }.cast::<T>();
        for index in 0 .. count {
            // SAFETY: ✔️ element `index` lies within the freshly allocated payload
            unsafe { first.add(index).write(init(index)) };
        }
        // SAFETY: ✔️ offset from a non-null allocation
        Ok(unsafe { NonNull::new_unchecked(first) })
    }

    /// Destroy every element of an array from
    /// [`new_array_with`](Self::new_array_with) and release its storage.
    ///
    /// ### Safety
    /// *   `ptr` must come from `new_array_with` on an equal resource and not be used again
    pub unsafe fn delete_array(&self, ptr: NonNull<T>) -> Result<(), Failure> {
        // SAFETY: ✔️ the count header sits ARRAY_HEADER bytes below the payload, where `new_array_with` wrote it
        let raw = unsafe { ptr.as_ptr().cast::<u8>().sub(ARRAY_HEADER) };
        // SAFETY: ✔️ as above
        let count = unsafe { raw.cast::<usize>().read() };
        for index in 0 .. count {
            // SAFETY: ✔️ each element was constructed by `new_array_with` and is dropped exactly once
            unsafe { drop_in_place(ptr.as_ptr().add(index)) };
        }
        // SAFETY: ✔️ `raw` is the address the resource's malloc returned
        unsafe { self.resource.free(NonNull::new_unchecked(raw.cast())) }
    }
}

#[cfg(feature = "bytemuck")] impl<'r, T: bytemuck::Zeroable> TypedAlloc<'r, T> {
    /// A zeroed `T`, without constructing a value first - all-zero bytes are
    /// valid for any [`bytemuck::Zeroable`] element.
    pub fn new_zeroed_object(&self) -> Result<NonNull<T>, Failure> {
        let ptr = self.allocate(1)?;
        // SAFETY: ✔️ freshly allocated storage for one T; zero-filling it produces a valid T per Zeroable
        unsafe { ptr.as_ptr().cast::<u8>().write_bytes(0, size_of::<T>()) };
        Ok(ptr)
    }
}



#[cfg(test)] use crate::allocator::dynamic::Dynamic;
#[cfg(test)] use crate::allocator::pool::Pool;
#[cfg(test)] use core::mem::MaybeUninit;

#[test] fn object_round_trip_restores_available_size() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 4096]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let ints = TypedAlloc::<u32>::new(&memory);

    let before = memory.available_size();
    let p = ints.new_object(0xC0FFEE).unwrap();
    assert_eq!(0xC0FFEE, *unsafe { p.as_ref() });
    unsafe { ints.delete_object(p) }.unwrap();
    assert_eq!(before, memory.available_size());
}

#[test] fn construct_and_destroy_are_balanced() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 4096]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let testers = TypedAlloc::<util::drop::Tester>::new(&memory);

    let p = testers.allocate(1).unwrap();
    unsafe { testers.construct(p, util::drop::Tester::new(11)) };
    assert_eq!(1, util::drop::Tester::counts()[11]);
    unsafe { testers.destroy(p) };
    assert_eq!(0, util::drop::Tester::counts()[11]);
    unsafe { testers.deallocate(p) }.unwrap();
}

#[test] fn arrays_construct_and_destroy_every_element() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 4096]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let testers = TypedAlloc::<util::drop::Tester>::new(&memory);

    let before = memory.available_size();
    let array = testers.new_array_with(17, |_| util::drop::Tester::new(42)).unwrap();
    assert_eq!(17, util::drop::Tester::counts()[42]);
    assert_eq!(42, unsafe { array.as_ref() }.get());
    unsafe { testers.delete_array(array) }.unwrap();
    assert_eq!(0, util::drop::Tester::counts()[42]);
    assert_eq!(before, memory.available_size());
}

#[test] fn array_elements_are_initialized_by_index() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 2048]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let ints = TypedAlloc::<u32>::new(&memory);

    let array = ints.new_array_with(10, |index| index as u32 * 3).unwrap();
    for index in 0 .. 10 {
        assert_eq!(index as u32 * 3, unsafe { array.as_ptr().add(index).read() });
    }
    unsafe { ints.delete_array(array) }.unwrap();
}

#[test] fn rebind_shares_the_resource() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Pool::from_array(&mut buffer, 64, true);
    let bytes = TypedAlloc::<u8>::new(&memory);
    let ints  = bytes.rebind::<u32>();

    assert!(core::ptr::eq(bytes.resource() as *const _ as *const (), ints.resource() as *const _ as *const ()));
    let p = ints.new_object(7).unwrap();
    // the rebound facade's memory can be released through the original one
    unsafe { bytes.deallocate(p.cast::<u8>()) }.unwrap();
}

#[test] fn equality_follows_the_resources() {
    let mut a : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let mut b : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let ra = Dynamic::from_array(&mut a);
    let rb = Dynamic::from_array(&mut b);

    assert_eq!(TypedAlloc::<u32>::new(&ra), TypedAlloc::<u8>::new(&ra));
    assert_ne!(TypedAlloc::<u32>::new(&ra), TypedAlloc::<u32>::new(&rb));
}

#[test] fn allocation_failures_surface() {
    let failing = crate::allocator::debug::Void;
    let ints = TypedAlloc::<u32>::new(&failing);
    assert_eq!(Err(Failure::OutOfMemory), ints.new_object(1));
    assert_eq!(Err(Failure::OutOfMemory), ints.new_array_with(4, |_| 0u32));
}

#[cfg(feature = "bytemuck")]
#[test] fn zeroed_objects_are_zero() {
    let mut buffer : MaybeUninit<[MaybeUninit<u8>; 1024]> = MaybeUninit::uninit();
    let memory = Dynamic::from_array(&mut buffer);
    let ints = TypedAlloc::<u64>::new(&memory);
    let p = ints.new_zeroed_object().unwrap();
    assert_eq!(0, *unsafe { p.as_ref() });
    unsafe { ints.delete_object(p) }.unwrap();
}
