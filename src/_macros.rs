/// Diagnostic output for development builds: forwards to `std::println!` when
/// the `debug-print` feature is enabled, expands to nothing otherwise.
macro_rules! dout {
    ( $($tt:tt)* ) => {{
        #[cfg(feature = "debug-print")] ::std::println!($($tt)*);
    }};
}
