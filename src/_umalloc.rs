#![doc = include_str!("../Readme.md")]
#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]

#[cfg(any(test, feature = "std"))] extern crate std;

#[macro_use] mod _macros;

mod align;                  pub use align::*;
mod error;                  pub use error::*;
mod region;                 pub(crate) use region::Region;
mod resource;               pub use resource::*;
mod typed;                  pub use typed::*;

#[path = "allocator/_allocator.rs"] pub mod allocator;

pub mod util {
    pub mod bytes;
    pub mod drop;
}

pub(crate) use error::raise;

use core::mem::MaybeUninit;
use core::ptr::NonNull;

/// <code>[NonNull]&lt;[MaybeUninit]&lt;[u8]&gt;&gt;</code> - what every [`Resource`] hands out and takes back
pub type AllocNN = NonNull<MaybeUninit<u8>>;
