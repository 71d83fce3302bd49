//! [`Failure`] - why a resource refused an operation

use core::fmt::{self, Display, Formatter};



/// Why a resource refused an operation.
///
/// Operations return <code>[Err]\(Failure\)</code> where a null/false result
/// would carry no cause.  With the `panicy-failures` feature the same value
/// is raised as a panic instead; success paths behave identically either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] pub enum Failure {
    /// The engine was constructed over a region that cannot host it (too
    /// small for its metadata, or a pool block larger than the region).
    /// Every later operation on the engine repeats this failure.
    InvalidConstruction,

    /// No block satisfies the request.
    OutOfMemory,

    /// Zero-byte requests are refused by the linear and stack engines.
    ZeroSize,

    /// The freed pointer is not a multiple of the engine alignment (dynamic).
    MisalignedFree,

    /// The pointer does not denote a freeable block: header and footer
    /// disagree (dynamic), or the engine has no per-block free at all (linear).
    NotABlock,

    /// The block is already free: marked free (dynamic), threaded on the
    /// free list (guarded pool), or the stack had nothing left to free.
    DoubleFree,

    /// The freed pointer is not the top of the stack.
    LifoViolation,

    /// The freed pointer lies outside the region or off the slot grid (pool).
    OutOfRange,
}

impl Display for Failure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Failure::InvalidConstruction    => write!(f, "the engine was constructed over a region that cannot host it"),
            Failure::OutOfMemory            => write!(f, "no block satisfies the request"),
            Failure::ZeroSize               => write!(f, "cannot fulfill a zero byte request"),
            Failure::MisalignedFree         => write!(f, "freed pointer is misaligned for this engine"),
            Failure::NotABlock              => write!(f, "pointer does not denote a block of this engine"),
            Failure::DoubleFree             => write!(f, "block is already free"),
            Failure::LifoViolation          => write!(f, "freed block is not the latest allocated one"),
            Failure::OutOfRange             => write!(f, "freed pointer is outside the region or off the slot grid"),
        }
    }
}

#[cfg(feature = "std")] impl std::error::Error for Failure {}

/// Failure transport: hand `failure` back to the caller, or raise it as a
/// panic when the `panicy-failures` feature is enabled.
#[cfg_attr(feature = "panicy-failures", track_caller)]
pub(crate) fn raise(failure: Failure) -> Failure {
    #[cfg(feature = "panicy-failures")] { panic!("memory resource failure: {failure}") }
    #[cfg(not(feature = "panicy-failures"))] { failure }
}
