// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Assertions that record themselves in a [`crate::TestLogger`] before panicking.

/// Assert a condition, logging the attempt and the result.
///
/// ```rust,ignore
/// logged_assert!(logger, output.status.success(), "tour should exit cleanly");
/// ```
#[macro_export]
macro_rules! logged_assert {
    ($logger:expr, $condition:expr) => {
        $crate::logged_assert!($logger, $condition, stringify!($condition))
    };
    ($logger:expr, $condition:expr, $message:expr) => {
        if let Err(e) = $logger.log(&format!("Asserting: {}", $message)) {
            eprintln!("Warning: Failed to write to test log: {}", e);
        }
        if $condition {
            let _ = $logger.log("✓ Assertion passed");
        } else {
            let _ = $logger.log("✗ Assertion failed");
            panic!(
                "Assertion failed: {} (log: {})",
                $message,
                $logger.log_path().display()
            );
        }
    };
}

/// Equality assertion that logs both sides.
#[macro_export]
macro_rules! logged_assert_eq {
    ($logger:expr, $left:expr, $right:expr) => {{
        let (left, right) = (&$left, &$right);
        if let Err(e) = $logger.log(&format!(
            "Asserting equality: {} == {}",
            stringify!($left),
            stringify!($right)
        )) {
            eprintln!("Warning: Failed to write to test log: {}", e);
        }
        if left == right {
            let _ = $logger.log("✓ Equality assertion passed");
        } else {
            let _ = $logger.log(&format!(
                "✗ Equality assertion failed\n  left: `{:?}`,\n right: `{:?}`",
                left, right
            ));
            panic!(
                "assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}` (log: {})",
                left,
                right,
                $logger.log_path().display()
            );
        }
    }};
}
