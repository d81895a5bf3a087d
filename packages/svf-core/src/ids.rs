//! Dense identifiers shared across the crate.
//!
//! Every PAG and SVFG node is a dense 32-bit `NodeID`; memory regions,
//! call sites, and MemSSA versions get their own newtypes so the
//! compiler catches cross-space mixups (passing a `CsId` where a
//! `NodeID` is expected, etc.) that plain `u32` would let through.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! dense_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub const fn new(id: u32) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

dense_id!(NodeID, "Identifier of a PAG or SVFG node.");
dense_id!(CsId, "Identifier of a callsite.");
dense_id!(MemRegionId, "Identifier of a memory region (C4).");
dense_id!(MRVerId, "Identifier of a memory-region SSA version object.");
dense_id!(LocId, "Identifier of an SVFG/ICFG location.");

/// A field offset within a GEP-derived object. `0` is the base field.
pub type Offset = u32;

/// Dense version number within an `(MR, function)` pair (C4) or a
/// location/object pair (C7). Contiguous starting at 0 within a
/// function per the MemSSA invariant; `0` doubles as `invalidVersion`
/// in the versioned-FS store context (see `vfs::meld`).
pub type Version = u32;

/// Reserved sentinel meaning "no version" in the versioned
/// flow-sensitive solver (C7).
pub const INVALID_VERSION: Version = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_roundtrip() {
        let n = NodeID::new(42);
        assert_eq!(u32::from(n), 42);
        assert_eq!(n.index(), 42);
        assert_eq!(format!("{}", n), "42");
    }

    #[test]
    fn distinct_id_spaces_dont_compare() {
        let n = NodeID::new(1);
        let c = CsId::new(1);
        // Would not compile if these were the same type: assert_eq!(n, c);
        assert_eq!(n.raw(), c.raw());
    }
}
