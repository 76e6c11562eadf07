//! Macro for implementing Display and FromStr for domain enums
//!
//! Severities, sources and escalation choices all have a canonical wire
//! string (used in logs, persisted records and config). This macro keeps the
//! `Display` and `FromStr` directions in one mapping.
//!
//! # Example
//!
//! ```rust
//! use faultline_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum SweepStatus {
//!     Idle,
//!     Sweeping,
//!     Stopped,
//! }
//!
//! impl_domain_status_conversions!(SweepStatus {
//!     Idle => "idle",
//!     Sweeping => "sweeping",
//!     Stopped => "stopped",
//! });
//!
//! assert_eq!(SweepStatus::Sweeping.to_string(), "sweeping");
//! assert_eq!("STOPPED".parse::<SweepStatus>(), Ok(SweepStatus::Stopped));
//! ```

/// Implements Display and FromStr for an enum from a variant/string mapping
///
/// - `Display` writes the mapped string verbatim
/// - `FromStr` matches case-insensitively and names the enum in its error
///
/// Mapped strings must be lowercase for parsing to round-trip.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = ::std::string::String;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => ::core::result::Result::Ok(Self::$variant),)+
                    _ => ::core::result::Result::Err(::std::format!(
                        "Invalid {}: {}",
                        ::core::stringify!($enum_name),
                        s
                    )),
                }
            }
        }
    };
}
