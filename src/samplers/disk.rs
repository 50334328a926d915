use super::*;
use crate::snapshot::{CounterName, Snapshot, SnapshotSet};
use nix::sys::statvfs::statvfs;
use std::collections::HashSet;
use std::path::PathBuf;

/// A block-device-backed filesystem from the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: String,
    pub mount_point: PathBuf,
}

/// Mounted filesystems whose source is a `/dev/` node, in mount-table order.
async fn read_mounts(path: &Path) -> Result<Vec<Mount>, SamplerError> {
    let content = read_proc(path).await?;
    parse_mounts(&content, path)
}

fn parse_mounts(content: &str, path: &Path) -> Result<Vec<Mount>, SamplerError> {
    let mut mounts = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.split_whitespace();
        let (Some(source), Some(mount_point)) = (parts.next(), parts.next()) else {
            return Err(SamplerError::ParseError {
                path: path.display().to_string(),
                field: "mount".into(),
                raw: line.to_string(),
            });
        };
        if !source.starts_with("/dev/") {
            continue;
        }
        mounts.push(Mount {
            source: unescape_mount_field(source),
            mount_point: PathBuf::from(unescape_mount_field(mount_point)),
        });
    }
    Ok(mounts)
}

/// The kernel escapes space, tab, newline and backslash as `\ooo` octal.
fn unescape_mount_field(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let octal = std::str::from_utf8(&bytes[i + 1..i + 4]).ok();
            if let Some(b) = octal.and_then(|o| u8::from_str_radix(o, 8).ok()) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Capacity gauge of one mounted filesystem, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUsage {
    pub fs: String,
    pub bytes_total: u64,
    pub bytes_used: u64,
    pub bytes_avail: u64,
    pub mount_point: String,
}

impl Gauge for DiskUsage {
    fn records(&self) -> Vec<Fields> {
        vec![struct_fields(self)]
    }
}

/// Disk capacity sampler: the mount table plus statvfs(2) per mount point.
pub struct DiskUsageSampler {
    mounts_path: PathBuf,
}

impl DiskUsageSampler {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            mounts_path: proc_root.join("mounts"),
        }
    }

    fn usage(mount: &Mount) -> Result<DiskUsage, SamplerError> {
        let stat = statvfs(&mount.mount_point).map_err(|e| SamplerError::SyscallError {
            call: "statvfs",
            path: mount.mount_point.display().to_string(),
            source: e,
        })?;

        let fragment = stat.fragment_size() as u64;
        let blocks = stat.blocks() as u64;
        let free = stat.blocks_free() as u64;
        let avail = stat.blocks_available() as u64;

        Ok(DiskUsage {
            fs: mount.source.clone(),
            bytes_total: blocks * fragment,
            bytes_used: blocks.saturating_sub(free) * fragment,
            bytes_avail: avail * fragment,
            mount_point: mount.mount_point.display().to_string(),
        })
    }

    /// Blocking: statvfs can hang on a stale network mount.
    fn usage_all(mounts: &[Mount]) -> Result<Vec<DiskUsage>, SamplerError> {
        mounts.iter().map(Self::usage).collect()
    }
}

#[async_trait]
impl Sampler for DiskUsageSampler {
    type Output = Vec<DiskUsage>;

    fn name(&self) -> &'static str {
        "disk"
    }

    async fn sample(&mut self) -> Result<Self::Output, SamplerError> {
        let mounts = read_mounts(&self.mounts_path).await?;
        match tokio::task::spawn_blocking(move || Self::usage_all(&mounts)).await {
            Ok(usage) => usage,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

/// Cumulative per-device counters from /proc/diskstats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiskIoCounter {
    ReadsCompleted,
    ReadsMerged,
    ReadSectors,
    ReadMillis,
    WritesCompleted,
    WritesMerged,
    WrittenSectors,
    WriteMillis,
    IoMillis,
    WeightedIoMillis,
}

impl CounterName for DiskIoCounter {
    fn as_str(&self) -> &'static str {
        match self {
            DiskIoCounter::ReadsCompleted => "readsCompleted",
            DiskIoCounter::ReadsMerged => "readsMerged",
            DiskIoCounter::ReadSectors => "readSectors",
            DiskIoCounter::ReadMillis => "readMillis",
            DiskIoCounter::WritesCompleted => "writesCompleted",
            DiskIoCounter::WritesMerged => "writesMerged",
            DiskIoCounter::WrittenSectors => "writtenSectors",
            DiskIoCounter::WriteMillis => "writeMillis",
            DiskIoCounter::IoMillis => "ioMillis",
            DiskIoCounter::WeightedIoMillis => "weightedIOMillis",
        }
    }
}

// Column 11 (I/Os currently in progress) is a gauge, not a counter, so it
// cannot be diffed and is left out.
const DISKSTATS_COLUMNS: [(usize, DiskIoCounter); 10] = [
    (3, DiskIoCounter::ReadsCompleted),
    (4, DiskIoCounter::ReadsMerged),
    (5, DiskIoCounter::ReadSectors),
    (6, DiskIoCounter::ReadMillis),
    (7, DiskIoCounter::WritesCompleted),
    (8, DiskIoCounter::WritesMerged),
    (9, DiskIoCounter::WrittenSectors),
    (10, DiskIoCounter::WriteMillis),
    (12, DiskIoCounter::IoMillis),
    (13, DiskIoCounter::WeightedIoMillis),
];

/// Disk I/O sampler for devices that back a mounted filesystem.
pub struct DiskIoSampler {
    mounts_path: PathBuf,
    diskstats_path: PathBuf,
}

impl DiskIoSampler {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            mounts_path: proc_root.join("mounts"),
            diskstats_path: proc_root.join("diskstats"),
        }
    }

    fn parse_diskstats(
        &self,
        content: &str,
        devices: &HashSet<String>,
    ) -> Result<SnapshotSet<DiskIoCounter>, SamplerError> {
        let mut set = SnapshotSet::new("fs");
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 14 {
                return Err(SamplerError::ParseError {
                    path: self.diskstats_path.display().to_string(),
                    field: "diskstats".into(),
                    raw: line.to_string(),
                });
            }

            let dev = format!("/dev/{}", parts[2]);
            if !devices.contains(&dev) {
                continue;
            }

            let snapshot = DISKSTATS_COLUMNS
                .iter()
                .map(|(idx, counter)| {
                    parse_u64(parts[*idx], &self.diskstats_path, counter.as_str())
                        .map(|v| (*counter, v))
                })
                .collect::<Result<Snapshot<_>, _>>()?;
            set.insert(dev, snapshot);
        }
        Ok(set)
    }
}

#[async_trait]
impl Sampler for DiskIoSampler {
    type Output = SnapshotSet<DiskIoCounter>;

    fn name(&self) -> &'static str {
        "disk-io"
    }

    async fn sample(&mut self) -> Result<Self::Output, SamplerError> {
        // re-read every tick so newly mounted devices are picked up
        let devices: HashSet<String> = read_mounts(&self.mounts_path)
            .await?
            .into_iter()
            .map(|m| m.source)
            .collect();
        let content = read_proc(&self.diskstats_path).await?;
        self.parse_diskstats(&content, &devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const SAMPLE_MOUNTS: &str = "\
sysfs /sys sysfs rw,nosuid,nodev,noexec,relatime 0 0
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
/dev/sda1 / ext4 rw,relatime 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
/dev/sdb1 /mnt/my\\040disk ext4 rw,relatime 0 0";

    const SAMPLE_DISKSTATS: &str = "\
   8       0 sda 1000 10 20000 300 500 5 8000 200 0 400 500 0 0 0 0
   8       1 sda1 900 9 18000 280 450 4 7000 190 2 380 470 0 0 0 0
   8      17 sdb1 10 1 80 3 5 0 40 2 0 4 5
   7       0 loop0 1 0 2 0 0 0 0 0 0 0 0";

    fn devices(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_parse_mounts_keeps_dev_sources() {
        let mounts = parse_mounts(SAMPLE_MOUNTS, Path::new("/proc/mounts")).unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts[0].source, "/dev/sda1");
        assert_eq!(mounts[0].mount_point, PathBuf::from("/"));
        assert_eq!(mounts[1].mount_point, PathBuf::from("/mnt/my disk"));
    }

    #[test]
    fn test_parse_mounts_truncated_line() {
        assert!(parse_mounts("/dev/sda1\n", Path::new("/proc/mounts")).is_err());
    }

    #[test]
    fn test_unescape_mount_field() {
        assert_eq!(unescape_mount_field("a\\040b"), "a b");
        assert_eq!(unescape_mount_field("tab\\011"), "tab\t");
        assert_eq!(unescape_mount_field("plain"), "plain");
        assert_eq!(unescape_mount_field("trailing\\04"), "trailing\\04");
    }

    #[test]
    fn test_parse_diskstats_filters_to_mounted_devices() {
        let sampler = DiskIoSampler::new(Path::new("/proc"));
        let set = sampler
            .parse_diskstats(SAMPLE_DISKSTATS, &devices(&["/dev/sda1", "/dev/sdb1"]))
            .unwrap();
        assert_eq!(set.entities().collect::<Vec<_>>(), vec!["/dev/sda1", "/dev/sdb1"]);

        let sda1 = set.get("/dev/sda1").unwrap();
        assert_eq!(sda1.get(DiskIoCounter::ReadsCompleted), Some(900));
        assert_eq!(sda1.get(DiskIoCounter::WriteMillis), Some(190));
        assert_eq!(sda1.get(DiskIoCounter::IoMillis), Some(380));
        assert_eq!(sda1.get(DiskIoCounter::WeightedIoMillis), Some(470));
        assert_eq!(sda1.len(), 10);
    }

    #[test]
    fn test_parse_diskstats_short_line() {
        let sampler = DiskIoSampler::new(Path::new("/proc"));
        assert!(sampler
            .parse_diskstats("8 0 sda 1 2 3", &devices(&[]))
            .is_err());
    }

    #[test]
    fn test_disk_io_records_carry_fs_label() {
        let sampler = DiskIoSampler::new(Path::new("/proc"));
        let set = sampler
            .parse_diskstats(SAMPLE_DISKSTATS, &devices(&["/dev/sdb1"]))
            .unwrap();
        let records = set.to_fields();
        assert_eq!(records[0]["fs"], Value::from("/dev/sdb1"));
        assert_eq!(records[0]["readSectors"], Value::from(80u64));
    }

    #[tokio::test]
    async fn test_disk_usage_from_fixture_mounts() {
        let dir = tempfile::tempdir().unwrap();
        let mounts = format!("/dev/fake0 {} ext4 rw 0 0\nnone /x tmpfs rw 0 0\n", dir.path().display());
        std::fs::write(dir.path().join("mounts"), mounts).unwrap();

        let mut sampler = DiskUsageSampler::new(dir.path());
        let usage = sampler.sample().await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].fs, "/dev/fake0");
        assert!(usage[0].bytes_total >= usage[0].bytes_used);
        assert_eq!(usage.records()[0]["mountPoint"], Value::from(dir.path().display().to_string()));
    }

    #[tokio::test]
    async fn test_disk_usage_unreachable_mount_point_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mounts"), "/dev/fake0 /definitely/not/here ext4 rw 0 0\n").unwrap();

        let mut sampler = DiskUsageSampler::new(dir.path());
        let err = sampler.sample().await.unwrap_err();
        assert!(matches!(err, SamplerError::SyscallError { call: "statvfs", .. }));
    }

    #[test]
    fn test_usage_runs_outside_a_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let mounts = vec![Mount {
            source: "/dev/fake0".into(),
            mount_point: dir.path().to_path_buf(),
        }];
        assert!(tokio::runtime::Handle::try_current().is_err());
        let usage = DiskUsageSampler::usage_all(&mounts).unwrap();
        assert_eq!(usage[0].fs, "/dev/fake0");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_disk_usage_does_not_stall_other_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let mounts: String = (0..32)
            .map(|i| format!("/dev/fake{i} {} ext4 rw 0 0\n", dir.path().display()))
            .collect();
        std::fs::write(dir.path().join("mounts"), mounts).unwrap();

        let mut sampler = DiskUsageSampler::new(dir.path());
        let sampling = tokio::spawn(async move { sampler.sample().await });
        // the only runtime thread stays free while statvfs runs on the blocking pool
        let other = tokio::spawn(async { 7 });
        assert_eq!(other.await.unwrap(), 7);
        let usage = sampling.await.unwrap().unwrap();
        assert_eq!(usage.len(), 32);
    }
}
