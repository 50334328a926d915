//! procfs fixture trees shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const STAT: &str = "\
cpu  100 0 50 1000 5 0 2 0 0 0
cpu0 100 0 50 1000 5 0 2 0 0 0
";

pub const MEMINFO: &str = "\
MemTotal:        2000 kB
MemFree:          500 kB
MemAvailable:     500 kB
";

pub fn netdev(rows: &[(&str, u64)]) -> String {
    let mut out = String::from(
        "Inter-|   Receive                                                |  Transmit\n \
         face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n",
    );
    for (iface, bytes) in rows {
        out.push_str(&format!(
            "{iface:>6}: {bytes} 1 0 0 0 0 0 0 {bytes} 1 0 0 0 0 0 0\n"
        ));
    }
    out
}

/// A fixture procfs whose single `/dev/` mount points at the temp dir itself.
pub fn proc_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("stat"), STAT).unwrap();
    fs::write(root.join("meminfo"), MEMINFO).unwrap();
    fs::write(
        root.join("mounts"),
        format!("proc /proc proc rw 0 0\n/dev/fake0 {} ext4 rw 0 0\n", root.display()),
    )
    .unwrap();
    fs::write(
        root.join("diskstats"),
        "   8       0 fake0 10 0 80 1 20 0 160 2 0 3 3\n   8      16 sdz 1 0 8 0 0 0 0 0 0 0 0\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("net")).unwrap();
    write_netdev(root, &[("lo", 100), ("eth0", 5000)]);
    dir
}

pub fn write_netdev(root: &Path, rows: &[(&str, u64)]) {
    fs::write(root.join("net").join("dev"), netdev(rows)).unwrap();
}
