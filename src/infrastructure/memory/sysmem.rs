//! System Memory Probe - 可回收内存探测
//!
//! 平台相关的内核 VM 统计细节收敛在这一个函数后面。
//! sysinfo 的 available_memory 统计的是可回收内存
//! （free + inactive/purgeable 等类别），而非单纯的 free。

use sysinfo::System;

/// 当前可回收内存（字节）
pub fn reclaimable_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory()
}

/// 物理内存总量（字节）
pub fn total_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reports_sane_values() {
        let total = total_bytes();
        let reclaimable = reclaimable_bytes();
        assert!(total > 0);
        assert!(reclaimable <= total);
    }
}
