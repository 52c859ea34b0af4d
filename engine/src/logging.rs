// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::sync::Once;

/// Install the process-global `tracing` subscriber, exactly once.
///
/// `start()` calls this on every invocation, including the second and later `start…stop` cycle
/// within one process; `tracing_subscriber`'s global dispatcher can only be set once, so a
/// second attempt would panic if not guarded.
pub fn install() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}
