//! Encoded names: the stable string identities of IR entities.
//!
//! Every class, method, field and local is identified by an *encoded name*,
//! an opaque string that is stable across linker runs. Encoded names are the
//! unit of identity for incremental matching, so they compare by content,
//! not by allocation.
//!
//! Names wrap `Arc<str>` and are therefore cheap to clone and to move
//! between threads; a name used as a map key costs one pointer-sized hash
//! over its bytes.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

macro_rules! encoded_name {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Wrap an encoded name.
            #[inline]
            pub fn new(name: impl Into<Arc<str>>) -> Self {
                Self(name.into())
            }

            /// The raw encoded string.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl PartialEq<str> for $name {
            #[inline]
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            #[inline]
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }
    };
}

encoded_name! {
    /// Encoded name of a class or interface.
    ClassName
}

encoded_name! {
    /// Encoded name of a method, unique within one member namespace of its
    /// owner.
    MethodName
}

encoded_name! {
    /// Encoded name of a field.
    FieldName
}

encoded_name! {
    /// Encoded name of a local variable binding.
    LocalName
}

impl MethodName {
    /// The encoded name of the zero-argument instance constructor.
    ///
    /// Module classes are initialized through this constructor; the
    /// optimizer inspects its body when deciding module-accessor
    /// elidability.
    #[must_use]
    pub fn no_arg_constructor() -> Self {
        Self::new("init___")
    }
}
