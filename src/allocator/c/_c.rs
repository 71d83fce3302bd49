//! The C heap as a [`Resource`](crate::Resource)

#[path = "malloc.rs"] mod malloc;  pub use malloc::Malloc;
