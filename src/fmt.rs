//! Logging macros.
//!
//! - `defmt` feature: forwards to `defmt` (the firmware links `defmt-rtt`).
//! - Host tests: prints to stdout/stderr.
//! - Otherwise: arguments are evaluated by reference and dropped.

macro_rules! log_warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($fmt $(, $arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        eprintln!(concat!("[WARN] ", $fmt) $(, $arg)*);

        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! log_debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($fmt $(, $arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        println!(concat!("[DEBUG] ", $fmt) $(, $arg)*);

        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! log_trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($fmt $(, $arg)*);

        #[cfg(all(not(feature = "defmt"), test))]
        println!(concat!("[TRACE] ", $fmt) $(, $arg)*);

        #[cfg(all(not(feature = "defmt"), not(test)))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
