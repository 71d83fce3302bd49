//! The concrete engines and auxiliary resources

#[cfg(feature = "libc")]
#[path = "c/_c.rs"]         pub mod c;
#[path = "debug/_debug.rs"] pub mod debug;

#[path = "dynamic.rs"]      pub mod dynamic;
#[path = "linear.rs"]       pub mod linear;
#[path = "pool.rs"]         pub mod pool;
#[path = "stack.rs"]        pub mod stack;
