//! Drop-accounting helpers for tests

#[cfg(any(feature = "std", test))] use core::marker::PhantomData;

#[cfg(any(feature = "std", test))] std::thread_local! { static TESTER_COUNTS : [core::cell::Cell<usize>; 256] = [(); 256].map(|_| core::cell::Cell::new(0)); }

/// Counts live instances per `data` value, so tests can assert that
/// construct/destroy pairs balance and nothing is dropped twice.
#[cfg(any(feature = "std", test))] #[derive(Debug)] pub struct Tester {
    data: u8,
    _phantom: PhantomData<*const ()>,
}

#[cfg(any(feature = "std", test))] impl Tester {
    pub fn new(data: u8) -> Self { TESTER_COUNTS.with(|tc| tc[data as usize].set(tc[data as usize].get() + 1)); Self { data, _phantom: PhantomData } }
    pub fn get(&self) -> u8 { self.data }
    pub fn counts() -> [usize; 256] { TESTER_COUNTS.with(|tc| tc.clone().map(|c| c.get())) }
}

#[cfg(any(feature = "std", test))] impl Drop for Tester {
    fn drop(&mut self) {
        let data = self.data as usize;
        TESTER_COUNTS.with(|tc| tc[data].set(tc[data].get().checked_sub(1).expect("count went negative, a util::drop::Tester was presumably dropped multiple times")))
    }
}

#[cfg(any(feature = "std", test))] impl Clone for Tester {
    fn clone(&self) -> Self { Self::new(self.data) }
}

#[cfg(any(feature = "std", test))] impl Default for Tester {
    fn default() -> Self { Self::new(0) }
}
