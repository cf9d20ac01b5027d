//! Canned host states for tests.

use super::filesystem::MockFs;

/// `top -b -n 1 -p 0` on a small Linux VM.
pub const LINUX_TOP_OUTPUT: &str = "\
top - 14:28:22 up 2 days,  3:26,  1 user,  load average: 0.00, 0.01, 0.05
Tasks:   0 total,   0 running,   0 sleeping,   0 stopped,   0 zombie
%Cpu(s):  2.8 us,  8.1 sy,  0.0 ni, 88.7 id,  0.4 wa,  0.0 hi,  0.1 si,  0.0 st
KiB Mem :   999936 total,   735636 free,   117680 used,   146620 buff/cache
KiB Swap:  2097148 total,  2097148 free,        0 used.   715508 avail Mem

  PID USER      PR  NI    VIRT    RES    SHR S  %CPU %MEM     TIME+ COMMAND
";

/// `top -l 1 -n 0` on macOS.
pub const MAC_TOP_OUTPUT: &str = "\
Processes: 373 total, 2 running, 371 sleeping, 1892 threads
2017/03/02 09:25:16
Load Avg: 1.81, 1.95, 2.01
CPU usage: 2.73% user, 10.95% sys, 86.30% idle
SharedLibs: 140M resident, 42M data, 17M linkedit.
MemRegions: 71522 total, 3464M resident, 112M private, 1187M shared.
PhysMem: 12G used (2149M wired), 4305M unused.
VM: 3457G vsize, 1065M framework vsize, 0(0) swapins, 0(0) swapouts.
Networks: packets: 1431958/1147M in, 1076498/158M out.
Disks: 1124520/24G read, 1032145/25G written.
";

impl MockFs {
    /// A Linux host with `/proc/stat`, `/proc/meminfo` and `/proc/loadavg`.
    pub fn linux_host() -> Self {
        let mut fs = Self::new();

        fs.add_file(
            "/proc/stat",
            "\
cpu  10000 500 3000 80000 1000 200 100 50 0 0
cpu0 2500 125 750 20000 250 50 25 12 0 0
cpu1 2500 125 750 20000 250 50 25 13 0 0
cpu2 2500 125 750 20000 250 50 25 12 0 0
cpu3 2500 125 750 20000 250 50 25 13 0 0
intr 1000000 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000
ctxt 500000
btime 1700000000
processes 10000
procs_running 2
procs_blocked 0
",
        );
        fs.add_file(
            "/proc/meminfo",
            "\
MemTotal:       16384000 kB
MemFree:         8192000 kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
Dirty:              1024 kB
",
        );
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");

        fs
    }
}
