/// Define a closed enumeration where every variant carries a fixed code and explanation.
///
/// Diagnosis output is consumed by people and by scripts grepping for the code, so the pair of
/// strings must never drift from the variant. This macro generates both accessors from a single
/// table with exhaustive matches, and an `ALL` array in declaration order. Adding a variant
/// without its strings does not compile.
///
/// # Example
///
/// ```text
/// labelled_enum! {
///     /// Some outcome.
///     pub enum Outcome {
///         /// It worked.
///         Fine = ("FINE", "everything went as expected"),
///     }
/// }
/// ```
macro_rules! labelled_enum {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = ($label:expr, $details:expr)
            ),+ $(,)*
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              $variant
            ),*
        }

        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),* ];

            /// The fixed upper-case code of this variant.
            pub fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),*
                }
            }

            /// The fixed human-readable explanation of this variant.
            pub fn description(self) -> &'static str {
                match self {
                    $( $name::$variant => $details ),*
                }
            }

            /// Position of the variant in `ALL`.
            pub fn index(self) -> usize {
                self as usize
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter) -> ::core::fmt::Result {
                f.write_str(self.label())
            }
        }
    }
}

#[cfg(feature = "log")]
#[macro_use]
mod log {
    macro_rules! net_log {
        (trace, $($arg:expr),*) => { ::log::trace!($($arg),*); };
        (debug, $($arg:expr),*) => { ::log::debug!($($arg),*); };
        (warn, $($arg:expr),*) => { ::log::warn!($($arg),*); };
    }
}

#[cfg(not(feature = "log"))]
#[macro_use]
mod log {
    macro_rules! net_log {
        ($level:ident, $($arg:expr),*) => { $( let _ = $arg; )* }
    }
}

macro_rules! net_trace {
    ($($arg:expr),*) => (net_log!(trace, $($arg),*));
}

macro_rules! net_debug {
    ($($arg:expr),*) => (net_log!(debug, $($arg),*));
}

macro_rules! net_warn {
    ($($arg:expr),*) => (net_log!(warn, $($arg),*));
}
