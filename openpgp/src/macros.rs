use std::cmp;

macro_rules! trace {
    ( $TRACE:expr, $fmt:expr, $($pargs:expr),* ) => {
        if $TRACE {
            eprintln!($fmt, $($pargs),*);
        }
    };
    ( $TRACE:expr, $fmt:expr ) => {
        trace!($TRACE, $fmt, );
    };
}

// Converts an indentation level to whitespace.
pub(crate) fn indent(i: isize) -> &'static str {
    use std::convert::TryFrom;
    let s = "                                                  ";
    &s[0..cmp::min(usize::try_from(i).unwrap_or(0), s.len())]
}

/// Opens a tracing scope.
///
/// Defines a `t!` macro that behaves like `format!`, prefixes the
/// message with `$func`, and prints it to stderr if `$TRACE` is set.
/// Every module keeps its own `const TRACE: bool` switch.
macro_rules! tracer {
    ( $TRACE:expr, $func:expr ) => {
        tracer!($TRACE, $func, 0)
    };
    ( $TRACE:expr, $func:expr, $indent:expr ) => {
        // Currently, Rust doesn't support $( ... ) in a nested
        // macro's definition.  See:
        // https://users.rust-lang.org/t/nested-macros-issue/8348/2
        #[allow(unused_macros)]
        macro_rules! t {
            ( $fmt:expr ) =>
            { trace!($TRACE, "{}{}: {}", crate::macros::indent($indent), $func, $fmt) };
            ( $fmt:expr, $a:expr ) =>
            { trace!($TRACE, "{}{}: {}", crate::macros::indent($indent), $func, format!($fmt, $a)) };
            ( $fmt:expr, $a:expr, $b:expr ) =>
            { trace!($TRACE, "{}{}: {}", crate::macros::indent($indent), $func, format!($fmt, $a, $b)) };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr ) =>
            { trace!($TRACE, "{}{}: {}", crate::macros::indent($indent), $func, format!($fmt, $a, $b, $c)) };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr, $d:expr ) =>
            { trace!($TRACE, "{}{}: {}", crate::macros::indent($indent), $func, format!($fmt, $a, $b, $c, $d)) };
            ( $fmt:expr, $a:expr, $b:expr, $c:expr, $d:expr, $e:expr ) =>
            { trace!($TRACE, "{}{}: {}", crate::macros::indent($indent), $func, format!($fmt, $a, $b, $c, $d, $e)) };
        }
    }
}

/// Like `matches!`, but binds nothing and reads left to right.
///
/// ```text
/// if destructures_to!(Tag::Signature = packet.tag()) { ... }
/// ```
macro_rules! destructures_to {
    ( $pat:pat = $expr:expr ) => {
        match $expr {
            $pat => true,
            _ => false,
        }
    };
}

/// Declares an enumeration of OpenPGP code points.
///
/// Each listed variant maps to exactly one octet.  The remaining
/// octets map to the catch-all variants, so conversion in both
/// directions is lossless.
macro_rules! code_points {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $( $(#[$vattr:meta])* $variant:ident = $value:literal, $label:expr; )*
        }
        $( $(#[$cattr:meta])* $catchall:ident($range:pat) => $fmt:literal; )+
    ) => {
        $(#[$attr])*
        pub enum $name {
            $( $(#[$vattr])* $variant, )*
            $( $(#[$cattr])* $catchall(u8), )+
        }

        impl From<u8> for $name {
            fn from(u: u8) -> Self {
                match u {
                    $( $value => $name::$variant, )*
                    $( $range => $name::$catchall(u), )+
                }
            }
        }

        impl From<$name> for u8 {
            fn from(v: $name) -> u8 {
                match v {
                    $( $name::$variant => $value, )*
                    $( $name::$catchall(u) => u, )+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                match *self {
                    $( $name::$variant => f.write_str($label), )*
                    $( $name::$catchall(u) => write!(f, $fmt, u), )+
                }
            }
        }
    }
}
