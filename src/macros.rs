//! Small derive-style macros shared by the newtype wrappers in this crate.

/// Derives a `Display` impl that prints a transparent `u32`/`u16` newtype's
/// inner value directly.
#[macro_export]
macro_rules! uint_field_display {
    ($struct_name: tt) => {
        impl core::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_fmt(format_args!("{}", self.0))
            }
        }
    };
}
