use sysinfo::System;

/// Memory available to new allocations, in bytes. `None` when the platform
/// does not report it.
pub fn available_memory() -> Option<u64> {
    let mut sys = System::new();
    sys.refresh_memory();
    match sys.available_memory() {
        0 => None,
        bytes => Some(bytes),
    }
}
