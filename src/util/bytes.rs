use core::fmt::{self, Formatter};



/// Pretty print `v` as e.g. "16 KiB" or similar
pub fn pretty(f: &mut Formatter<'_>, mut v: usize) -> fmt::Result {
    for unit in ["B", "KiB", "MiB", "GiB", "TiB", "PiB"] {
        if v <= 8192 { return write!(f, "{v} {unit}") }
        v >>= 10;
    }
    write!(f, "{v} EiB")
}
