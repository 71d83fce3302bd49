//! Test-double resources: [`Void`] never allocates, [`Throw`] panics on use

#[path = "throw.rs"] mod throw;    pub use throw::Throw;
#[path = "void.rs"]  mod void;     pub use void::Void;
