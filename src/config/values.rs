//! Closed value sets accepted by the configuration layers

use std::fmt;
use std::str::FromStr;

/// Declare a closed enumeration with its config spelling.
///
/// Parsing trims and lowercases the input; anything else is rejected with
/// the list of accepted spellings.
macro_rules! closed_value_set {
    (
        $(#[$meta:meta])*
        $name:ident default $default:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!(
                        "expected one of {}",
                        [$($text),+].join("|")
                    )),
                }
            }
        }
    };
}

closed_value_set! {
    /// Which writer backs the console sink
    LogBackend default Native {
        Native => "native",
        Facade => "facade",
    }
}

closed_value_set! {
    /// Per-sink line encoding
    OutputFormat default Json {
        Json => "json",
        Text => "text",
        Enriched => "enriched",
    }
}

closed_value_set! {
    ConsoleTarget default Stdout {
        Stdout => "stdout",
        Stderr => "stderr",
    }
}

closed_value_set! {
    /// Partition selection forwarded to the broker client
    PartitionStrategy default Random {
        Random => "random",
        Hash => "hash",
        RoundRobin => "roundrobin",
    }
}

closed_value_set! {
    /// How the broker message key is derived from a record
    KeyStrategy default Level {
        Level => "level",
        TimeSeconds => "time_seconds",
        TimeNanoseconds => "time_nanoseconds",
        Fixed => "fixed",
        Extracted => "extracted",
    }
}

closed_value_set! {
    Compression default None {
        None => "none",
        Gzip => "gzip",
        Snappy => "snappy",
        Lz4 => "lz4",
        Zstd => "zstd",
    }
}

closed_value_set! {
    /// Acknowledgment policy forwarded to the broker client
    AckPolicy default Local {
        None => "none",
        Local => "local",
        All => "all",
    }
}

closed_value_set! {
    /// Event identifier generation strategy
    IdStrategy default Hmac {
        Hmac => "hmac",
        Uuid => "uuid",
        Increment => "increment",
        Function => "function",
    }
}
