// Logging macros that redact the formatted message before emitting it
#[macro_export]
macro_rules! redacted_info {
    ($($arg:tt)*) => {
        $crate::__private_tracing::info!("{}", $crate::redact(&format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! redacted_warn {
    ($($arg:tt)*) => {
        $crate::__private_tracing::warn!("{}", $crate::redact(&format!($($arg)*)))
    };
}

#[macro_export]
macro_rules! redacted_error {
    ($($arg:tt)*) => {
        $crate::__private_tracing::error!("{}", $crate::redact(&format!($($arg)*)))
    };
}
