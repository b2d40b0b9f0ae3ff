use sysinfo::System;

/// Total physical memory of the host, in bytes
pub fn total_ram_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_ram_is_reported() {
        assert!(total_ram_bytes() > 0);
    }
}
